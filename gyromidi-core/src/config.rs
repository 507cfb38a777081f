use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use gyromidi_types::{
    ArpPattern, Axis, ControllerBinding, Key, ModeBindings, PerformanceSettings, RecenterMode,
    Scale, Tonality, Waveform, WaveformBinding, MIDI_MAX,
};

use crate::error::EngineResult;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    performance: PerformanceConfig,
    #[serde(default)]
    one_shot: ModeConfig,
    #[serde(default)]
    arp: ModeConfig,
    waveforms: Option<Vec<WaveformConfig>>,
    #[serde(default)]
    midi: MidiConfig,
}

#[derive(Deserialize, Default)]
struct PerformanceConfig {
    channel: Option<u8>,
    velocity: Option<u8>,
    base_note: Option<NoteValue>,
    scale: Option<String>,
    octaves: Option<u8>,
    gliss: Option<bool>,
    legato: Option<bool>,
    quantize: Option<bool>,
    gamma: Option<f32>,
    pattern: Option<String>,
    gate_controllers: Option<Vec<u8>>,
    speed: Option<String>,
}

#[derive(Deserialize, Default)]
struct ModeConfig {
    note: Option<String>,
    bend: Option<String>,
    velocity: Option<String>,
    controllers: Option<Vec<ControllerConfig>>,
}

#[derive(Deserialize, Clone)]
struct ControllerConfig {
    axis: String,
    cc: i16,
    recenter: Option<String>,
}

#[derive(Deserialize, Clone)]
struct WaveformConfig {
    cc: u8,
    shape: String,
    rate: Option<String>,
    depth: Option<String>,
    frequency: Option<f32>,
    min_hz: Option<f32>,
    max_hz: Option<f32>,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    output: Option<String>,
    input: Option<String>,
}

/// `base_note` may be a MIDI number or a note name.
#[derive(Deserialize, Clone)]
#[serde(untagged)]
enum NoteValue {
    Number(i64),
    Name(String),
}

pub struct Config {
    performance: PerformanceConfig,
    one_shot: ModeConfig,
    arp: ModeConfig,
    waveforms: Vec<WaveformConfig>,
    midi: MidiConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    pub fn load() -> Self {
        let mut base = embedded();
        if let Some(path) = user_config_path() {
            if path.exists() {
                match read_file(&path) {
                    Ok(user) => merge(&mut base, user),
                    Err(e) => log::warn!(target: "config", "{}", e),
                }
            }
        }
        Self::from_file(base)
    }

    /// Embedded defaults overlaid with the file at `path`.
    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let mut base = embedded();
        merge(&mut base, read_file(path)?);
        Ok(Self::from_file(base))
    }

    /// Embedded defaults overlaid with `contents`.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let user: ConfigFile =
            toml::from_str(contents).map_err(|e| format!("invalid config: {}", e))?;
        let mut base = embedded();
        merge(&mut base, user);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            performance: file.performance,
            one_shot: file.one_shot,
            arp: file.arp,
            waveforms: file.waveforms.unwrap_or_default(),
            midi: file.midi,
        }
    }

    /// The immutable settings the scheduler is built with. Values that do
    /// not parse are logged and replaced by their defaults.
    pub fn settings(&self) -> PerformanceSettings {
        let fallback = PerformanceSettings::default();
        let p = &self.performance;
        PerformanceSettings {
            channel: match p.channel {
                Some(c @ 1..=16) => c - 1,
                Some(c) => {
                    log::warn!(target: "config", "channel {} out of range 1-16", c);
                    fallback.channel
                }
                None => fallback.channel,
            },
            velocity: p.velocity.map(|v| v.min(MIDI_MAX)).unwrap_or(fallback.velocity),
            base_note: p
                .base_note
                .as_ref()
                .and_then(|n| warn_none(parse_base_note(n), "base_note"))
                .unwrap_or(fallback.base_note),
            tonality: p
                .scale
                .as_deref()
                .and_then(|s| warn_none(parse_tonality(s), "scale")),
            octaves: p.octaves.map(|o| o.max(1)).unwrap_or(fallback.octaves),
            gliss: p.gliss.unwrap_or(fallback.gliss),
            legato: p.legato.unwrap_or(fallback.legato),
            quantize: p.quantize.unwrap_or(fallback.quantize),
            gamma: p.gamma.filter(|g| *g > 0.0).unwrap_or(fallback.gamma),
            pattern: p
                .pattern
                .as_deref()
                .and_then(|s| warn_none(parse_pattern(s), "pattern"))
                .unwrap_or(fallback.pattern),
            gate_controllers: p
                .gate_controllers
                .as_deref()
                .map(gate_controllers)
                .unwrap_or(fallback.gate_controllers),
            one_shot: mode_bindings(&self.one_shot),
            arp: mode_bindings(&self.arp),
            speed: parse_axis(p.speed.as_deref(), "speed"),
            waveforms: self.waveforms.iter().filter_map(waveform_binding).collect(),
        }
    }

    /// Output port selector, first port when unset.
    pub fn midi_output(&self) -> Option<&str> {
        self.midi.output.as_deref()
    }

    /// Input port selector; no input listener when unset.
    pub fn midi_input(&self) -> Option<&str> {
        self.midi.input.as_deref()
    }
}

fn embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(file) => file,
        Err(e) => {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        }
    }
}

fn read_file(path: &Path) -> EngineResult<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read config {}: {}", path.display(), e))?;
    let file = toml::from_str::<ConfigFile>(&contents)
        .map_err(|e| format!("ignoring malformed config {}: {}", path.display(), e))?;
    Ok(file)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gyromidi").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_performance(&mut base.performance, user.performance);
    merge_mode(&mut base.one_shot, user.one_shot);
    merge_mode(&mut base.arp, user.arp);
    if user.waveforms.is_some() {
        base.waveforms = user.waveforms;
    }
    if user.midi.output.is_some() {
        base.midi.output = user.midi.output;
    }
    if user.midi.input.is_some() {
        base.midi.input = user.midi.input;
    }
}

fn merge_performance(base: &mut PerformanceConfig, user: PerformanceConfig) {
    if user.channel.is_some() {
        base.channel = user.channel;
    }
    if user.velocity.is_some() {
        base.velocity = user.velocity;
    }
    if user.base_note.is_some() {
        base.base_note = user.base_note;
    }
    if user.scale.is_some() {
        base.scale = user.scale;
    }
    if user.octaves.is_some() {
        base.octaves = user.octaves;
    }
    if user.gliss.is_some() {
        base.gliss = user.gliss;
    }
    if user.legato.is_some() {
        base.legato = user.legato;
    }
    if user.quantize.is_some() {
        base.quantize = user.quantize;
    }
    if user.gamma.is_some() {
        base.gamma = user.gamma;
    }
    if user.pattern.is_some() {
        base.pattern = user.pattern;
    }
    if user.gate_controllers.is_some() {
        base.gate_controllers = user.gate_controllers;
    }
    if user.speed.is_some() {
        base.speed = user.speed;
    }
}

fn merge_mode(base: &mut ModeConfig, user: ModeConfig) {
    if user.note.is_some() {
        base.note = user.note;
    }
    if user.bend.is_some() {
        base.bend = user.bend;
    }
    if user.velocity.is_some() {
        base.velocity = user.velocity;
    }
    if user.controllers.is_some() {
        base.controllers = user.controllers;
    }
}

fn warn_none<T>(value: Option<T>, key: &str) -> Option<T> {
    if value.is_none() {
        log::warn!(target: "config", "ignoring unparseable {}", key);
    }
    value
}

/// Axis name, or "none"/"" to leave the behaviour unbound.
fn parse_axis(s: Option<&str>, key: &str) -> Option<Axis> {
    let s = s?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("none") {
        return None;
    }
    warn_none(Axis::from_name(s), key)
}

fn mode_bindings(mode: &ModeConfig) -> ModeBindings {
    ModeBindings {
        note: parse_axis(mode.note.as_deref(), "note"),
        bend: parse_axis(mode.bend.as_deref(), "bend"),
        velocity: parse_axis(mode.velocity.as_deref(), "velocity"),
        controllers: mode
            .controllers
            .iter()
            .flatten()
            .filter_map(controller_binding)
            .collect(),
    }
}

fn controller_binding(c: &ControllerConfig) -> Option<ControllerBinding> {
    let axis = parse_axis(Some(&c.axis), "controller axis")?;
    if c.cc == 0 || c.cc.unsigned_abs() > MIDI_MAX as u16 {
        // 0 cannot carry the inversion sign; cc0 is bank select anyway
        log::warn!(target: "config", "ignoring controller cc {}", c.cc);
        return None;
    }
    let recenter = match c.recenter.as_deref() {
        None => RecenterMode::default(),
        Some(s) => warn_none(parse_recenter(s), "recenter").unwrap_or_default(),
    };
    Some(ControllerBinding::new(axis, c.cc, recenter))
}

fn gate_controllers(ccs: &[u8]) -> Vec<u8> {
    ccs.iter()
        .copied()
        .filter(|&cc| {
            let valid = cc <= MIDI_MAX;
            if !valid {
                log::warn!(target: "config", "ignoring gate controller cc {}", cc);
            }
            valid
        })
        .collect()
}

fn waveform_binding(w: &WaveformConfig) -> Option<WaveformBinding> {
    let shape = warn_none(Waveform::from_name(&w.shape), "waveform shape")?;
    if w.cc > MIDI_MAX {
        log::warn!(target: "config", "ignoring waveform on cc {}", w.cc);
        return None;
    }
    let mut binding = WaveformBinding::new(w.cc, shape);
    binding.rate = parse_axis(w.rate.as_deref(), "waveform rate");
    binding.depth = parse_axis(w.depth.as_deref(), "waveform depth");
    if let Some(f) = w.frequency {
        binding.frequency = f.max(0.0);
    }
    if let Some(lo) = w.min_hz {
        binding.min_hz = lo.max(0.0);
    }
    if let Some(hi) = w.max_hz {
        binding.max_hz = hi.max(binding.min_hz);
    }
    Some(binding)
}

fn parse_recenter(s: &str) -> Option<RecenterMode> {
    match s.to_lowercase().as_str() {
        "free" => Some(RecenterMode::Free),
        "center" | "centre" => Some(RecenterMode::Center),
        "drag" => Some(RecenterMode::Drag),
        _ => None,
    }
}

fn parse_base_note(value: &NoteValue) -> Option<u8> {
    match value {
        NoteValue::Number(n) => u8::try_from(*n).ok().filter(|n| *n <= MIDI_MAX),
        NoteValue::Name(s) => parse_note(s),
    }
}

/// "60" or a note name like "F#3", with C3 = 48.
pub fn parse_note(s: &str) -> Option<u8> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u8>() {
        return (n <= MIDI_MAX).then_some(n);
    }
    let re = Regex::new(r"^([A-Ga-g]#?)(-?\d)$").ok()?;
    let caps = re.captures(s)?;
    let key = Key::from_name(&caps[1])?;
    let octave: i32 = caps[2].parse().ok()?;
    let note = 12 * (octave + 1) + key.semitone();
    u8::try_from(note).ok().filter(|n| *n <= MIDI_MAX)
}

/// "D" = D major, "d" = D minor, "Dp" / "dp" = D pentatonic.
pub fn parse_tonality(s: &str) -> Option<Tonality> {
    let re = Regex::new(r"^([A-Ga-g]#?)(p?)$").ok()?;
    let caps = re.captures(s.trim())?;
    let name = &caps[1];
    let key = Key::from_name(name)?;
    let scale = if !caps[2].is_empty() {
        Scale::Pentatonic
    } else if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        Scale::Major
    } else {
        Scale::Minor
    };
    Some(Tonality { key, scale })
}

/// "up", "down", "random", or note positions separated by colons.
pub fn parse_pattern(s: &str) -> Option<ArpPattern> {
    match s.trim().to_lowercase().as_str() {
        "up" => return Some(ArpPattern::Up),
        "down" => return Some(ArpPattern::Down),
        "random" => return Some(ArpPattern::Random),
        _ => {}
    }
    let re = Regex::new(r"^-?\d+(:-?\d+)*$").ok()?;
    if !re.is_match(s.trim()) {
        return None;
    }
    let steps = s
        .trim()
        .split(':')
        .map(|p| p.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;
    Some(ArpPattern::Sequence(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_embedded_config() {
        let config = Config::from_toml_str("").unwrap();
        let settings = config.settings();
        assert_eq!(settings.channel, 0);
        assert_eq!(settings.velocity, 127);
        assert_eq!(settings.base_note, 48);
        assert_eq!(settings.tonality, None);
        assert_eq!(settings.octaves, 1);
        assert!(!settings.gliss);
        assert!(!settings.quantize);
        assert_eq!(settings.pattern, ArpPattern::Up);
        assert_eq!(settings.speed, Some(Axis::X));
        assert_eq!(settings.one_shot.note, Some(Axis::X));
        assert_eq!(settings.arp.note, Some(Axis::Y));
        assert!(settings.waveforms.is_empty());
        assert_eq!(config.midi_output(), None);
        assert_eq!(config.midi_input(), None);
    }

    #[test]
    fn test_user_values_override_fieldwise() {
        let config = Config::from_toml_str(
            r#"
            [performance]
            channel = 10
            scale = "d#p"
            pattern = "0:2:-1"

            [arp]
            bend = "z"

            [[arp.controllers]]
            axis = "y"
            cc = -7
            recenter = "drag"

            [[waveforms]]
            cc = 74
            shape = "wah"
            depth = "z"

            [midi]
            output = "Synth"
            "#,
        )
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.channel, 9);
        assert_eq!(
            settings.tonality,
            Some(Tonality { key: Key::Ds, scale: Scale::Pentatonic })
        );
        assert_eq!(settings.pattern, ArpPattern::Sequence(vec![0, 2, -1]));
        // Untouched keys keep their defaults
        assert_eq!(settings.arp.note, Some(Axis::Y));
        assert_eq!(settings.arp.bend, Some(Axis::Z));
        assert_eq!(
            settings.arp.controllers,
            vec![ControllerBinding::new(Axis::Y, -7, RecenterMode::Drag)]
        );
        assert_eq!(settings.waveforms.len(), 1);
        assert_eq!(settings.waveforms[0].shape, Waveform::AutoWah);
        assert_eq!(settings.waveforms[0].depth, Some(Axis::Z));
        assert_eq!(config.midi_output(), Some("Synth"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_toml_str(
            r#"
            [performance]
            channel = 17
            base_note = "H2"
            pattern = "sideways"
            gamma = -1.0
            speed = "none"
            gate_controllers = [64, 200, 127]
            "#,
        )
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.gate_controllers, vec![64, 127]);
        assert_eq!(settings.channel, 0);
        assert_eq!(settings.base_note, 48);
        assert_eq!(settings.pattern, ArpPattern::Up);
        assert_eq!(settings.gamma, 1.0);
        assert_eq!(settings.speed, None);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(Config::from_toml_str("[performance\nchannel = ").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[performance]\nbase_note = 60\nlegato = true").unwrap();
        let settings = Config::load_from(file.path()).unwrap().settings();
        assert_eq!(settings.base_note, 60);
        assert!(settings.legato);

        assert!(Config::load_from(Path::new("/nonexistent/gyromidi.toml")).is_err());
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("C3"), Some(48));
        assert_eq!(parse_note("C2"), Some(36));
        assert_eq!(parse_note("F#3"), Some(54));
        assert_eq!(parse_note("a4"), Some(69));
        assert_eq!(parse_note("C-1"), Some(0));
        assert_eq!(parse_note("36"), Some(36));
        assert_eq!(parse_note("200"), None);
        assert_eq!(parse_note("G9"), Some(127));
        assert_eq!(parse_note("A9"), None);
        assert_eq!(parse_note("X3"), None);
    }

    #[test]
    fn test_parse_tonality() {
        assert_eq!(parse_tonality("D"), Some(Tonality { key: Key::D, scale: Scale::Major }));
        assert_eq!(parse_tonality("d"), Some(Tonality { key: Key::D, scale: Scale::Minor }));
        assert_eq!(
            parse_tonality("F#p"),
            Some(Tonality { key: Key::Fs, scale: Scale::Pentatonic })
        );
        assert_eq!(parse_tonality("Q"), None);
        assert_eq!(parse_tonality(""), None);
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!(parse_pattern("Down"), Some(ArpPattern::Down));
        assert_eq!(parse_pattern("random"), Some(ArpPattern::Random));
        assert_eq!(parse_pattern("1:3:5:2:4"), Some(ArpPattern::Sequence(vec![1, 3, 5, 2, 4])));
        assert_eq!(parse_pattern("0:-1"), Some(ArpPattern::Sequence(vec![0, -1])));
        assert_eq!(parse_pattern("1::2"), None);
        assert_eq!(parse_pattern(""), None);
    }
}
