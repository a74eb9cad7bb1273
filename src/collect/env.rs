use crate::config::DoctorConfig;
use doctor_shared::artifacts::SAMPLE_INTERVAL_ENV;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Replace whatever value was inherited
    Set,
    /// Put the value in front of the inherited one, separated by a space
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    pub var: String,
    pub value: String,
    pub mode: OverlayMode,
}

impl EnvOverlay {
    pub fn set(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
            mode: OverlayMode::Set,
        }
    }

    pub fn prepend(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
            mode: OverlayMode::Prepend,
        }
    }

    fn apply(&self, current: Option<&str>) -> String {
        match (self.mode, current) {
            (OverlayMode::Prepend, Some(current)) if !current.is_empty() => {
                format!("{} {current}", self.value)
            }
            _ => self.value.clone(),
        }
    }
}

/// Applies `overlays` in order on top of the `inherited` environment.
pub fn merge_env<K, V>(
    inherited: impl IntoIterator<Item = (K, V)>,
    overlays: &[EnvOverlay],
) -> BTreeMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    let mut env: BTreeMap<String, String> = inherited
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    for overlay in overlays {
        let value = overlay.apply(env.get(&overlay.var).map(String::as_str));
        env.insert(overlay.var.clone(), value);
    }

    env
}

/// Flags making the target runtime write its trace log and load the sampler.
pub fn injected_flags(config: &DoctorConfig) -> String {
    let mut flags = vec![
        "--trace-events-enabled".to_string(),
        "--trace-event-categories".to_string(),
        config.trace_categories.clone(),
    ];
    if let Some(sampler) = &config.sampler {
        flags.push("--require".to_string());
        flags.push(sampler.to_string_lossy().into_owned());
    }
    shell_words::join(flags)
}

/// The overlays applied to every supervised child, in precedence order.
pub fn instrumentation_overlays(config: &DoctorConfig) -> Vec<EnvOverlay> {
    vec![
        EnvOverlay::prepend(&config.flags_env_var, injected_flags(config)),
        EnvOverlay::set(SAMPLE_INTERVAL_ENV, config.sample_interval.to_string()),
    ]
}
