//! Per-user encoding preferences.
//!
//! Every field is a closed enumeration (or a range-checked newtype) so a stored
//! record can never hold a value the encoder command builder does not understand.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {field}")]
pub struct InvalidSetting {
    pub field: SettingField,
    pub value: String,
}

impl InvalidSetting {
    fn new(field: SettingField, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Fields a user may change. `key()` doubles as the storage column/hash field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    UploadMode,
    Resolution,
    Vcodec,
    Bits,
    Crf,
    AspectRatio,
}

impl SettingField {
    pub const ALL: [SettingField; 6] = [
        SettingField::UploadMode,
        SettingField::Resolution,
        SettingField::Vcodec,
        SettingField::Bits,
        SettingField::Crf,
        SettingField::AspectRatio,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SettingField::UploadMode => "upload_mode",
            SettingField::Resolution => "resolution",
            SettingField::Vcodec => "vcodec",
            SettingField::Bits => "bits",
            SettingField::Crf => "crf",
            SettingField::AspectRatio => "aspect_ratio",
        }
    }

    /// Human readable list of accepted values, used in error replies.
    pub fn accepted_values(&self) -> &'static str {
        match self {
            SettingField::UploadMode => "video, document",
            SettingField::Resolution => "240, 360, 480, 576, 720, 1080, original",
            SettingField::Vcodec => "x264, x265",
            SettingField::Bits => "8, 10",
            SettingField::Crf => "21-40",
            SettingField::AspectRatio => "16:9, 4:3",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload_mode" | "mode" | "upload" => Ok(SettingField::UploadMode),
            "resolution" | "res" => Ok(SettingField::Resolution),
            "vcodec" | "codec" => Ok(SettingField::Vcodec),
            "bits" | "bit_depth" => Ok(SettingField::Bits),
            "crf" | "quality" => Ok(SettingField::Crf),
            "aspect_ratio" | "aspect" => Ok(SettingField::AspectRatio),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadMode {
    Video,
    Document,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Video => "video",
            UploadMode::Document => "document",
        }
    }
}

impl FromStr for UploadMode {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(UploadMode::Video),
            "document" | "doc" | "file" => Ok(UploadMode::Document),
            _ => Err(InvalidSetting::new(SettingField::UploadMode, s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    X264,
    X265,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::X264 => "x264",
            VideoCodec::X265 => "x265",
        }
    }

    /// Encoder library passed to `-c:v`.
    pub fn encoder_library(&self) -> &'static str {
        match self {
            VideoCodec::X264 => "libx264",
            VideoCodec::X265 => "libx265",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x264" | "h264" | "libx264" => Ok(VideoCodec::X264),
            "x265" | "h265" | "hevc" | "libx265" => Ok(VideoCodec::X265),
            _ => Err(InvalidSetting::new(SettingField::Vcodec, s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Ten,
}

impl BitDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitDepth::Eight => "8",
            BitDepth::Ten => "10",
        }
    }

    pub fn pixel_format(&self) -> &'static str {
        match self {
            BitDepth::Eight => "yuv420p",
            BitDepth::Ten => "yuv420p10le",
        }
    }
}

impl FromStr for BitDepth {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("bit").trim_end_matches("bits") {
            "8" => Ok(BitDepth::Eight),
            "10" => Ok(BitDepth::Ten),
            _ => Err(InvalidSetting::new(SettingField::Bits, s)),
        }
    }
}

/// Output resolution class. `Original` keeps the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    P240,
    P360,
    P480,
    P576,
    P720,
    P1080,
    Original,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::P240,
        Resolution::P360,
        Resolution::P480,
        Resolution::P576,
        Resolution::P720,
        Resolution::P1080,
        Resolution::Original,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P240 => "240",
            Resolution::P360 => "360",
            Resolution::P480 => "480",
            Resolution::P576 => "576",
            Resolution::P720 => "720",
            Resolution::P1080 => "1080",
            Resolution::Original => "original",
        }
    }

    pub fn height(&self) -> Option<u32> {
        match self {
            Resolution::P240 => Some(240),
            Resolution::P360 => Some(360),
            Resolution::P480 => Some(480),
            Resolution::P576 => Some(576),
            Resolution::P720 => Some(720),
            Resolution::P1080 => Some(1080),
            Resolution::Original => None,
        }
    }

    /// Pixel dimensions for `-s`, `None` when the source size is kept.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.height().and_then(dimensions_for_height)
    }
}

/// Fixed lookup from vertical resolution class to `WxH`.
pub fn dimensions_for_height(height: u32) -> Option<(u32, u32)> {
    match height {
        240 => Some((426, 240)),
        360 => Some((640, 360)),
        480 => Some((854, 480)),
        576 => Some((1024, 576)),
        720 => Some((1280, 720)),
        1080 => Some((1920, 1080)),
        _ => None,
    }
}

impl FromStr for Resolution {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.trim_end_matches('p') {
            "240" => Ok(Resolution::P240),
            "360" => Ok(Resolution::P360),
            "480" => Ok(Resolution::P480),
            "576" => Ok(Resolution::P576),
            "720" => Ok(Resolution::P720),
            "1080" => Ok(Resolution::P1080),
            "original" | "source" => Ok(Resolution::Original),
            _ => Err(InvalidSetting::new(SettingField::Resolution, s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Widescreen,
    Standard,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Standard => "4:3",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Widescreen),
            "4:3" => Ok(AspectRatio::Standard),
            _ => Err(InvalidSetting::new(SettingField::AspectRatio, s)),
        }
    }
}

/// Constant rate factor, restricted to the range offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crf(u8);

impl Crf {
    pub const MIN: u8 = 21;
    pub const MAX: u8 = 40;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Crf(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl FromStr for Crf {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Crf::new)
            .ok_or_else(|| InvalidSetting::new(SettingField::Crf, s))
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(UploadMode, VideoCodec, BitDepth, Resolution, AspectRatio);

impl fmt::Display for Crf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single-field change, the only way preferences are mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceUpdate {
    UploadMode(UploadMode),
    Resolution(Resolution),
    Vcodec(VideoCodec),
    Bits(BitDepth),
    Crf(Crf),
    AspectRatio(AspectRatio),
}

impl PreferenceUpdate {
    pub fn parse(field: SettingField, raw: &str) -> Result<Self, InvalidSetting> {
        Ok(match field {
            SettingField::UploadMode => PreferenceUpdate::UploadMode(raw.parse()?),
            SettingField::Resolution => PreferenceUpdate::Resolution(raw.parse()?),
            SettingField::Vcodec => PreferenceUpdate::Vcodec(raw.parse()?),
            SettingField::Bits => PreferenceUpdate::Bits(raw.parse()?),
            SettingField::Crf => PreferenceUpdate::Crf(raw.parse()?),
            SettingField::AspectRatio => PreferenceUpdate::AspectRatio(raw.parse()?),
        })
    }

    pub fn field(&self) -> SettingField {
        match self {
            PreferenceUpdate::UploadMode(_) => SettingField::UploadMode,
            PreferenceUpdate::Resolution(_) => SettingField::Resolution,
            PreferenceUpdate::Vcodec(_) => SettingField::Vcodec,
            PreferenceUpdate::Bits(_) => SettingField::Bits,
            PreferenceUpdate::Crf(_) => SettingField::Crf,
            PreferenceUpdate::AspectRatio(_) => SettingField::AspectRatio,
        }
    }

    /// Storage representation of the new value.
    pub fn value(&self) -> String {
        match self {
            PreferenceUpdate::UploadMode(v) => v.to_string(),
            PreferenceUpdate::Resolution(v) => v.to_string(),
            PreferenceUpdate::Vcodec(v) => v.to_string(),
            PreferenceUpdate::Bits(v) => v.to_string(),
            PreferenceUpdate::Crf(v) => v.to_string(),
            PreferenceUpdate::AspectRatio(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPreferences {
    pub upload_mode: UploadMode,
    pub resolution: Resolution,
    pub vcodec: VideoCodec,
    pub bits: BitDepth,
    pub crf: Crf,
    pub aspect_ratio: AspectRatio,
}

impl Default for EncodingPreferences {
    fn default() -> Self {
        Self {
            upload_mode: UploadMode::Document,
            resolution: Resolution::P240,
            vcodec: VideoCodec::X265,
            bits: BitDepth::Ten,
            crf: Crf(30),
            aspect_ratio: AspectRatio::Widescreen,
        }
    }
}

impl EncodingPreferences {
    pub fn apply(&mut self, update: PreferenceUpdate) {
        match update {
            PreferenceUpdate::UploadMode(v) => self.upload_mode = v,
            PreferenceUpdate::Resolution(v) => self.resolution = v,
            PreferenceUpdate::Vcodec(v) => self.vcodec = v,
            PreferenceUpdate::Bits(v) => self.bits = v,
            PreferenceUpdate::Crf(v) => self.crf = v,
            PreferenceUpdate::AspectRatio(v) => self.aspect_ratio = v,
        }
    }

    pub fn value_of(&self, field: SettingField) -> String {
        match field {
            SettingField::UploadMode => self.upload_mode.to_string(),
            SettingField::Resolution => self.resolution.to_string(),
            SettingField::Vcodec => self.vcodec.to_string(),
            SettingField::Bits => self.bits.to_string(),
            SettingField::Crf => self.crf.to_string(),
            SettingField::AspectRatio => self.aspect_ratio.to_string(),
        }
    }

    /// All fields in storage form, in `SettingField::ALL` order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        SettingField::ALL
            .iter()
            .map(|field| (field.key(), self.value_of(*field)))
            .collect()
    }

    /// Rebuild from stored `(key, value)` pairs. Missing fields take defaults,
    /// unknown keys are ignored, illegal values are rejected.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, InvalidSetting>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut prefs = Self::default();
        for (key, value) in pairs {
            if let Ok(field) = key.as_ref().parse::<SettingField>() {
                prefs.apply(PreferenceUpdate::parse(field, value.as_ref())?);
            }
        }
        Ok(prefs)
    }
}
