//! Parsing of ffprobe's JSON report.

use serde::Deserialize;
use serde_json::Value;

use super::progress::{format_duration, format_file_size};

pub trait FromStream {
    fn from_stream(stream_data: &Value) -> Option<Self>
    where
        Self: Sized;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub pix_fmt: Option<String>,
    pub duration: Option<f64>,
    pub bit_rate: Option<u64>,
}

impl FromStream for VideoStream {
    fn from_stream(stream_data: &Value) -> Option<Self> {
        if stream_data.get("codec_type")?.as_str()? != "video" {
            return None;
        }
        Some(VideoStream {
            codec: text(stream_data, "codec_name").unwrap_or_else(|| "unknown".to_string()),
            width: stream_data.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
            height: stream_data.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
            pix_fmt: text(stream_data, "pix_fmt"),
            duration: number(stream_data.get("duration")),
            bit_rate: number(stream_data.get("bit_rate")).map(|b| b as u64),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub codec: String,
    pub channels: Option<u32>,
    pub duration: Option<f64>,
    pub bit_rate: Option<u64>,
}

impl FromStream for AudioStream {
    fn from_stream(stream_data: &Value) -> Option<Self> {
        if stream_data.get("codec_type")?.as_str()? != "audio" {
            return None;
        }
        Some(AudioStream {
            codec: text(stream_data, "codec_name").unwrap_or_else(|| "unknown".to_string()),
            channels: stream_data
                .get("channels")
                .and_then(Value::as_u64)
                .map(|c| c as u32),
            duration: number(stream_data.get("duration")),
            bit_rate: number(stream_data.get("bit_rate")).map(|b| b as u64),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    #[serde(default)]
    format: Value,
    #[serde(default)]
    streams: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeReport {
    pub format_duration: Option<f64>,
    pub size: Option<u64>,
    pub bit_rate: Option<u64>,
    pub video_streams: Vec<VideoStream>,
    pub audio_streams: Vec<AudioStream>,
}

impl ProbeReport {
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawProbe = serde_json::from_slice(raw)?;
        Ok(ProbeReport {
            format_duration: number(raw.format.get("duration")),
            size: number(raw.format.get("size")).map(|s| s as u64),
            bit_rate: number(raw.format.get("bit_rate")).map(|b| b as u64),
            video_streams: raw.streams.iter().filter_map(VideoStream::from_stream).collect(),
            audio_streams: raw.streams.iter().filter_map(AudioStream::from_stream).collect(),
        })
    }

    /// Whole seconds of media, `None` when no positive duration was reported.
    /// The container duration wins; otherwise the longest stream is used.
    pub fn duration_secs(&self) -> Option<u64> {
        let stream_max = self
            .video_streams
            .iter()
            .filter_map(|s| s.duration)
            .chain(self.audio_streams.iter().filter_map(|s| s.duration))
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

        self.format_duration
            .filter(|d| *d > 0.0)
            .or(stream_max)
            .filter(|d| d.is_finite() && *d >= 1.0)
            .map(|d| d.floor() as u64)
    }

    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }

    /// One line description for the final report.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(video) = self.primary_video() {
            parts.push(format!("{} {}x{}", video.codec, video.width, video.height));
        }
        if let Some(audio) = self.audio_streams.first() {
            parts.push(audio.codec.clone());
        }
        if let Some(bit_rate) = self.bit_rate {
            parts.push(format!("{} kb/s", bit_rate / 1000));
        }
        if let Some(duration) = self.duration_secs() {
            parts.push(format_duration(duration));
        }
        if let Some(size) = self.size {
            parts.push(format_file_size(size));
        }
        parts.join(" · ")
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// ffprobe reports most numbers as strings.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite() && *n >= 0.0)
}
