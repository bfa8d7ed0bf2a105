use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Sampling window and trajectory projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kinematics {
    pub history_capacity: usize,
    pub projection_ms: f64,
    /// Margin added on every side of the target before the trajectory hit test.
    pub target_margin_px: f64,
    /// Dwell radius as a fraction of the target's larger side.
    pub dwell_factor: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            projection_ms: 500.0,
            target_margin_px: 10.0,
            dwell_factor: 0.75,
        }
    }
}

/// Points awarded (or taken) by each component of a pointer sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub proximity: f64,
    pub proximity_falloff: f64,
    pub trajectory_hit: f64,
    pub approach: f64,
    pub alignment_reward: f64,
    pub alignment_penalty: f64,
    pub dwell: f64,
    /// Dwell duration (seconds) at which the dwell bonus reaches its cap.
    pub dwell_saturation_secs: f64,
    pub slow_speed: f64,
    pub slow_bonus: f64,
    pub fast_speed: f64,
    pub fast_penalty_max: f64,
    pub fast_penalty_divisor: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            proximity: 40.0,
            proximity_falloff: 2.0,
            trajectory_hit: 35.0,
            approach: 25.0,
            alignment_reward: 25.0,
            alignment_penalty: 10.0,
            dwell: 20.0,
            dwell_saturation_secs: 2.0,
            slow_speed: 100.0,
            slow_bonus: 10.0,
            fast_speed: 300.0,
            fast_penalty_max: 10.0,
            fast_penalty_divisor: 50.0,
        }
    }
}

/// Conflicting-activity penalties. They stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Penalties {
    pub scroll: f64,
    pub scroll_recent_ms: u64,
    pub reading: f64,
    pub selection: f64,
    pub click_elsewhere: f64,
    pub click_recent_ms: u64,
    /// A click counts as "elsewhere" beyond this many target widths from the centre.
    pub click_distance_factor: f64,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            scroll: 40.0,
            scroll_recent_ms: 800,
            reading: 25.0,
            selection: 50.0,
            click_elsewhere: 15.0,
            click_recent_ms: 1000,
            click_distance_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blend {
    pub min_decay: f64,
    pub max_old_weight: f64,
    /// Scores closer than this to the stored one are neither stored nor announced.
    pub change_epsilon: f64,
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            min_decay: 0.3,
            max_old_weight: 0.8,
            change_epsilon: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    pub min_interval_ms: u64,
    pub scrolling_window_ms: u64,
    pub small_move_px: f64,
    pub reading_moves: u32,
    pub navigating_speed: f64,
    pub idle_ms: u64,
    pub selection_poll_ms: u64,
    pub exploring_step: f64,
}

impl Default for Activity {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            scrolling_window_ms: 500,
            small_move_px: 5.0,
            reading_moves: 5,
            navigating_speed: 500.0,
            idle_ms: 2000,
            selection_poll_ms: 500,
            exploring_step: 5.0,
        }
    }
}

/// Immediate adjustments made by scroll and click events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Events {
    pub scroll_penalty: f64,
    pub scroll_reading_boost: f64,
    pub click_boost: f64,
    /// Clicks above `viewport.height / click_zone_divisor` boost the score.
    pub click_zone_divisor: f64,
    pub default_threshold: f64,
}

impl Default for Events {
    fn default() -> Self {
        Self {
            scroll_penalty: 20.0,
            scroll_reading_boost: 10.0,
            click_boost: 30.0,
            click_zone_divisor: 3.0,
            default_threshold: 30.0,
        }
    }
}

/// Every tunable constant of the intent heuristic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub kinematics: Kinematics,
    pub weights: Weights,
    pub penalties: Penalties,
    pub blend: Blend,
    pub activity: Activity,
    pub events: Events,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(flatten)]
    pub tuning: Tuning,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_tuning(&profile.tuning)?;
        Ok(profile)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn default_config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("intentctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(default_config_dir()?)
    }

    /// Open (and seed, if empty) the profile store rooted at `config_dir`.
    pub fn open(config_dir: PathBuf) -> Result<Self> {
        let profiles_dir = config_dir.join("profiles");
        fs::create_dir_all(&profiles_dir)
            .with_context(|| format!("failed to create {}", profiles_dir.display()))?;

        let def_path = profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = config_dir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profiles_dir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir,
            profiles_dir,
            active_ptr,
        })
    }

    pub fn active_path(&self) -> PathBuf {
        self.profile_path(&self.active_name)
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    /// Re-read the active profile. On error the last good profile is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    /// Load a named profile without making it active.
    pub fn load(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = crate::input::discover_pointers()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "input_dir_present": Path::new("/dev/input").exists(),
            "input_group_member": check_in_input_group(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "pointer_devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
}

pub fn validate_tuning(t: &Tuning) -> Result<()> {
    let k = &t.kinematics;
    if k.history_capacity < 2 {
        return Err(anyhow!("kinematics.history_capacity must be at least 2"));
    }
    if !(k.projection_ms.is_finite() && k.projection_ms > 0.0) {
        return Err(anyhow!("kinematics.projection_ms must be a positive duration"));
    }
    if !(k.dwell_factor.is_finite() && k.dwell_factor > 0.0) {
        return Err(anyhow!("kinematics.dwell_factor must be positive"));
    }
    check_non_negative("kinematics.target_margin_px", k.target_margin_px)?;

    let w = &t.weights;
    for (name, v) in [
        ("weights.proximity", w.proximity),
        ("weights.proximity_falloff", w.proximity_falloff),
        ("weights.trajectory_hit", w.trajectory_hit),
        ("weights.approach", w.approach),
        ("weights.alignment_reward", w.alignment_reward),
        ("weights.alignment_penalty", w.alignment_penalty),
        ("weights.dwell", w.dwell),
        ("weights.slow_speed", w.slow_speed),
        ("weights.slow_bonus", w.slow_bonus),
        ("weights.fast_speed", w.fast_speed),
        ("weights.fast_penalty_max", w.fast_penalty_max),
    ] {
        check_non_negative(name, v)?;
    }
    if !(w.dwell_saturation_secs.is_finite() && w.dwell_saturation_secs > 0.0) {
        return Err(anyhow!("weights.dwell_saturation_secs must be positive"));
    }
    if !(w.fast_penalty_divisor.is_finite() && w.fast_penalty_divisor > 0.0) {
        return Err(anyhow!("weights.fast_penalty_divisor must be positive"));
    }
    if w.slow_speed > w.fast_speed {
        return Err(anyhow!("weights.slow_speed must not exceed weights.fast_speed"));
    }

    let p = &t.penalties;
    for (name, v) in [
        ("penalties.scroll", p.scroll),
        ("penalties.reading", p.reading),
        ("penalties.selection", p.selection),
        ("penalties.click_elsewhere", p.click_elsewhere),
        ("penalties.click_distance_factor", p.click_distance_factor),
    ] {
        check_non_negative(name, v)?;
    }

    let b = &t.blend;
    check_non_negative("blend.min_decay", b.min_decay)?;
    check_non_negative("blend.change_epsilon", b.change_epsilon)?;
    if !(0.0..1.0).contains(&b.max_old_weight) {
        return Err(anyhow!("blend.max_old_weight must be in [0,1)"));
    }

    let a = &t.activity;
    if a.selection_poll_ms == 0 {
        return Err(anyhow!("activity.selection_poll_ms must be positive"));
    }
    check_non_negative("activity.small_move_px", a.small_move_px)?;
    check_non_negative("activity.navigating_speed", a.navigating_speed)?;
    check_non_negative("activity.exploring_step", a.exploring_step)?;

    let e = &t.events;
    for (name, v) in [
        ("events.scroll_penalty", e.scroll_penalty),
        ("events.scroll_reading_boost", e.scroll_reading_boost),
        ("events.click_boost", e.click_boost),
    ] {
        check_non_negative(name, v)?;
    }
    if !(e.click_zone_divisor.is_finite() && e.click_zone_divisor > 0.0) {
        return Err(anyhow!("events.click_zone_divisor must be positive"));
    }
    if !(0.0..=100.0).contains(&e.default_threshold) {
        return Err(anyhow!("events.default_threshold must be in [0,100]"));
    }
    Ok(())
}

fn check_non_negative(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(anyhow!("{name} must be a finite, non-negative number (got {v})"));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| line.split(':').nth(3).unwrap_or("").split(',').any(|u| u == user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_matches_builtin_tuning() {
        let p = Profile::parse(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!(p.tuning, Tuning::default());
    }

    #[test]
    fn partial_profile_falls_back_to_defaults() {
        let p = Profile::parse(
            r#"
            [meta]
            name = "twitchy"

            [kinematics]
            projection_ms = 250.0

            [penalties]
            selection = 80.0
            "#,
        )
        .unwrap();
        assert_eq!(p.tuning.kinematics.projection_ms, 250.0);
        assert_eq!(p.tuning.kinematics.history_capacity, 10);
        assert_eq!(p.tuning.penalties.selection, 80.0);
        assert_eq!(p.tuning.penalties.scroll, 40.0);
        assert_eq!(p.tuning.weights, Weights::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Profile::parse("[kinematics]\nhistory_capacity = 1\n").is_err());
        assert!(Profile::parse("[kinematics]\nprojection_ms = 0.0\n").is_err());
        assert!(Profile::parse("[weights]\ndwell = -1.0\n").is_err());
        assert!(Profile::parse("[blend]\nmax_old_weight = 1.0\n").is_err());
        assert!(Profile::parse("[activity]\nselection_poll_ms = 0\n").is_err());
        assert!(Profile::parse("[events]\ndefault_threshold = 101.0\n").is_err());
        assert!(Profile::parse("[weights]\nslow_speed = 400.0\n").is_err());
    }

    #[test]
    fn profile_survives_toml_round_trip() {
        let mut p = Profile::parse(default_profile_text()).unwrap();
        p.tuning.blend.change_epsilon = 0.5;
        let txt = p.to_toml().unwrap();
        let back = Profile::parse(&txt).unwrap();
        assert_eq!(back.tuning, p.tuning);
    }

    #[test]
    fn store_installs_default_and_switches_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ConfigState::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(cfg.active_name, "default");
        assert_eq!(cfg.list_profiles(), vec!["default".to_string()]);

        fs::write(
            cfg.profile_path("calm"),
            "[meta]\nname = \"calm\"\n\n[blend]\nmax_old_weight = 0.5\n",
        )
        .unwrap();
        cfg.set_active("calm").unwrap();
        assert_eq!(cfg.profile.tuning.blend.max_old_weight, 0.5);
        assert_eq!(fs::read_to_string(&cfg.active_ptr).unwrap(), "calm");
        assert_eq!(cfg.list_profiles(), vec!["calm".to_string(), "default".to_string()]);

        // reopening picks up the persisted pointer
        let again = ConfigState::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(again.active_name, "calm");
    }

    #[test]
    fn missing_or_broken_profiles_keep_last_good() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ConfigState::open(dir.path().to_path_buf()).unwrap();
        assert!(cfg.set_active("nope").is_err());
        assert_eq!(cfg.active_name, "default");

        fs::write(cfg.profile_path("broken"), "[blend]\nmax_old_weight = 7.0\n").unwrap();
        assert!(cfg.set_active("broken").is_err());
        assert_eq!(cfg.active_name, "default");

        fs::write(cfg.active_path(), "[kinematics]\nhistory_capacity = 0\n").unwrap();
        assert!(cfg.reload().is_err());
        assert_eq!(cfg.profile.tuning, Tuning::default());
    }
}
