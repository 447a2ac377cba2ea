use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::domain::preferences::EncodingPreferences;

pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";
pub const PRESET: &str = "medium";

/// Machine-readable progress on stdout, human stats suppressed.
const PROGRESS_ARGS: &[&str] = &["-progress", "pipe:1", "-nostats"];

const PROBE_ARGS: &[&str] = &[
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

/// A fully resolved encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub output: PathBuf,
    pub reports_progress: bool,
}

impl EncodeCommand {
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Single-line rendering for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in self.args_lossy() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Deterministic: the same inputs always produce the same argument list.
pub fn build_encode_command(
    encoder: &Path,
    input: &Path,
    output: &Path,
    prefs: &EncodingPreferences,
    with_progress: bool,
) -> EncodeCommand {
    let mut args: Vec<OsString> = Vec::with_capacity(24);
    if with_progress {
        args.extend(PROGRESS_ARGS.iter().map(OsString::from));
    }
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    args.push("-c:v".into());
    args.push(prefs.vcodec.encoder_library().into());
    args.push("-pix_fmt".into());
    args.push(prefs.bits.pixel_format().into());
    args.push("-crf".into());
    args.push(prefs.crf.to_string().into());
    if let Some((width, height)) = prefs.resolution.dimensions() {
        args.push("-s".into());
        args.push(format!("{width}x{height}").into());
    }
    for arg in ["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE, "-preset", PRESET, "-y"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_owned());

    EncodeCommand {
        program: encoder.to_path_buf(),
        args,
        output: output.to_path_buf(),
        reports_progress: with_progress,
    }
}

pub fn build_probe_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = PROBE_ARGS.iter().map(OsString::from).collect();
    args.push(input.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::{PreferenceUpdate, SettingField};

    fn prefs(pairs: &[(SettingField, &str)]) -> EncodingPreferences {
        let mut prefs = EncodingPreferences::default();
        for (field, value) in pairs {
            prefs.apply(PreferenceUpdate::parse(*field, value).unwrap());
        }
        prefs
    }

    #[test]
    fn test_x265_480p_ten_bit() {
        let prefs = prefs(&[
            (SettingField::Vcodec, "x265"),
            (SettingField::Resolution, "480"),
            (SettingField::Crf, "28"),
            (SettingField::Bits, "10"),
        ]);
        let cmd = build_encode_command(
            Path::new("ffmpeg"),
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out.mp4"),
            &prefs,
            true,
        );

        assert_eq!(
            cmd.args_lossy(),
            vec![
                "-progress", "pipe:1", "-nostats", "-i", "/tmp/in.mp4", "-c:v", "libx265",
                "-pix_fmt", "yuv420p10le", "-crf", "28", "-s", "854x480", "-c:a", "aac", "-b:a",
                "128k", "-preset", "medium", "-y", "/tmp/out.mp4",
            ]
        );
        assert!(cmd.reports_progress);
        assert_eq!(cmd.output, PathBuf::from("/tmp/out.mp4"));
    }

    #[test]
    fn test_x264_eight_bit_without_progress() {
        let prefs = prefs(&[
            (SettingField::Vcodec, "x264"),
            (SettingField::Bits, "8"),
            (SettingField::Resolution, "720"),
        ]);
        let cmd = build_encode_command(
            Path::new("/usr/bin/ffmpeg"),
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &prefs,
            false,
        );
        let args = cmd.args_lossy();

        assert_eq!(args[0], "-i");
        assert!(!args.iter().any(|a| a == "-progress"));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-s", "1280x720"]));
        assert!(!cmd.reports_progress);
    }

    #[test]
    fn test_original_resolution_omits_size_flag() {
        let prefs = prefs(&[(SettingField::Resolution, "original")]);
        let cmd = build_encode_command(
            Path::new("ffmpeg"),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &prefs,
            true,
        );
        assert!(!cmd.args_lossy().iter().any(|a| a == "-s"));
    }

    #[test]
    fn test_aspect_ratio_does_not_alter_command() {
        let widescreen = prefs(&[(SettingField::AspectRatio, "16:9")]);
        let standard = prefs(&[(SettingField::AspectRatio, "4:3")]);
        let build = |p: &EncodingPreferences| {
            build_encode_command(
                Path::new("ffmpeg"),
                Path::new("in.mp4"),
                Path::new("out.mp4"),
                p,
                true,
            )
        };
        assert_eq!(build(&widescreen), build(&standard));
    }

    #[test]
    fn test_command_is_deterministic() {
        let prefs = EncodingPreferences::default();
        let first = build_encode_command(
            Path::new("ffmpeg"),
            Path::new("a.mp4"),
            Path::new("b.mp4"),
            &prefs,
            true,
        );
        let second = build_encode_command(
            Path::new("ffmpeg"),
            Path::new("a.mp4"),
            Path::new("b.mp4"),
            &prefs,
            true,
        );
        assert_eq!(first, second);
        assert_eq!(
            first.display(),
            "ffmpeg -progress pipe:1 -nostats -i a.mp4 -c:v libx265 -pix_fmt yuv420p10le -crf 30 \
             -s 426x240 -c:a aac -b:a 128k -preset medium -y b.mp4"
        );
    }

    #[test]
    fn test_probe_args() {
        let args: Vec<String> = build_probe_args(Path::new("clip.mp4"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams", "clip.mp4"]
        );
    }
}
