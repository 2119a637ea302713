//! Encoder argument vectors.
//!
//! Pure functions: nothing here spawns a process. Every builder returns the
//! argument list without the program name, output path last.

use std::path::Path;

use tinytv_media_model::{DeviceFormat, EncodeProfile, Quality, ScaleMode, TargetFps};

/// Loudness normalization applied when a profile asks for it.
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-14:TP=-1.5:LRA=11";

/// Flags that regenerate timestamps and decouple input/output timebases.
const TIMESTAMP_REPAIR_FLAGS: [&str; 4] = ["-fflags", "+genpts", "-copytb", "0"];

/// Which encode of a convert item is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePass {
    /// First attempt.
    Initial,
    /// Re-encode after a failed conformance check.
    Repair,
}

/// Scale chain fitting any source into the device resolution.
pub fn scale_filter(format: &DeviceFormat, mode: ScaleMode) -> String {
    let (w, h) = (format.width, format.height);
    match mode {
        ScaleMode::Contain => format!(
            "scale=trunc(iw*min({w}/iw\\,{h}/ih)/2)*2:trunc(ih*min({w}/iw\\,{h}/ih)/2)*2,\
             setsar=1,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
        ),
        ScaleMode::Cover => format!(
            "scale=trunc(iw*max({w}/iw\\,{h}/ih)/2)*2:trunc(ih*max({w}/iw\\,{h}/ih)/2)*2,\
             setsar=1,crop={w}:{h}"
        ),
        ScaleMode::Stretch => format!("scale={w}:{h},setsar=1"),
    }
}

/// Scale chain followed by the output frame rate.
pub fn video_filter(format: &DeviceFormat, mode: ScaleMode, fps: TargetFps) -> String {
    format!("{},fps={}", scale_filter(format, mode), fps)
}

/// Timing/format normalization used by every combine strategy.
pub fn normalization_filter(format: &DeviceFormat, fps: TargetFps) -> String {
    format!("fps={},format={},setsar=1", fps, format.pixel_format)
}

fn preamble() -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-stats".to_string(),
        "-y".to_string(),
    ]
}

fn push_timestamp_repair(args: &mut Vec<String>) {
    args.extend(TIMESTAMP_REPAIR_FLAGS.iter().map(|s| s.to_string()));
}

fn video_codec_args(format: &DeviceFormat, quality: Quality) -> Vec<String> {
    vec![
        "-pix_fmt".to_string(),
        format.pixel_format.to_string(),
        "-c:v".to_string(),
        format.video_codec.to_string(),
        "-vtag".to_string(),
        format.video_tag.to_string(),
        "-q:v".to_string(),
        quality.to_string(),
    ]
}

fn audio_codec_args(format: &DeviceFormat) -> Vec<String> {
    vec![
        "-c:a".to_string(),
        format.audio_codec.to_string(),
        "-ar".to_string(),
        format.audio_sample_rate.to_string(),
        "-ac".to_string(),
        format.audio_channels.to_string(),
    ]
}

/// Output-side arguments shared by every combine strategy.
fn combine_output_args(
    format: &DeviceFormat,
    fps: TargetFps,
    quality: Quality,
    output: &Path,
) -> Vec<String> {
    let mut args = vec!["-r".to_string(), fps.to_string()];
    args.extend(video_codec_args(format, quality));
    args.extend(audio_codec_args(format));
    args.push(output.display().to_string());
    args
}

/// Single-file convert into the device format.
pub fn convert_args(profile: &EncodeProfile, src: &Path, dst: &Path, pass: EncodePass) -> Vec<String> {
    let format = &profile.format;
    let mut args = preamble();
    if pass == EncodePass::Repair {
        push_timestamp_repair(&mut args);
    }
    args.extend([
        "-i".to_string(),
        src.display().to_string(),
        "-vf".to_string(),
        video_filter(format, profile.scale_mode, profile.fps),
        "-r".to_string(),
        profile.fps.to_string(),
        "-vsync".to_string(),
        "cfr".to_string(),
    ]);
    args.extend(video_codec_args(format, profile.quality));
    args.extend(audio_codec_args(format));
    if profile.normalize_audio {
        args.push("-af".to_string());
        args.push(LOUDNORM_FILTER.to_string());
    }
    args.push(dst.display().to_string());
    args
}

/// One input re-encoded with the normalization chain.
pub fn combine_direct_args(
    format: &DeviceFormat,
    fps: TargetFps,
    quality: Quality,
    src: &Path,
    dst: &Path,
) -> Vec<String> {
    let mut args = preamble();
    args.extend([
        "-i".to_string(),
        src.display().to_string(),
        "-vf".to_string(),
        normalization_filter(format, fps),
    ]);
    args.extend(combine_output_args(format, fps, quality, dst));
    args
}

/// Many inputs read through the concat demuxer from a list file.
pub fn combine_list_args(
    format: &DeviceFormat,
    fps: TargetFps,
    quality: Quality,
    list_file: &Path,
    dst: &Path,
) -> Vec<String> {
    let mut args = preamble();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_file.display().to_string(),
    ]);
    push_timestamp_repair(&mut args);
    args.push("-vf".to_string());
    args.push(normalization_filter(format, fps));
    args.extend(combine_output_args(format, fps, quality, dst));
    args
}

/// `filter_complex` graph normalizing each input and concatenating them.
pub fn concat_filter_graph(format: &DeviceFormat, fps: TargetFps, inputs: usize) -> String {
    let norm = normalization_filter(format, fps);
    let mut parts = Vec::with_capacity(inputs * 2 + 1);
    let mut labels = String::new();
    for i in 0..inputs {
        parts.push(format!("[{i}:v:0]{norm}[v{i}]"));
        parts.push(format!(
            "[{i}:a:0]aresample={},aformat=sample_fmts={}:channel_layouts={}[a{i}]",
            format.audio_sample_rate,
            format.audio_sample_format,
            format.channel_layout()
        ));
        labels.push_str(&format!("[v{i}][a{i}]"));
    }
    parts.push(format!("{labels}concat=n={inputs}:v=1:a=1[v][a]"));
    parts.join(";")
}

/// Several inputs joined in a single filter graph.
pub fn combine_filter_graph_args(
    format: &DeviceFormat,
    fps: TargetFps,
    quality: Quality,
    inputs: &[&Path],
    dst: &Path,
) -> Vec<String> {
    let mut args = preamble();
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        concat_filter_graph(format, fps, inputs.len()),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
    ]);
    args.extend(combine_output_args(format, fps, quality, dst));
    args
}

/// Short video-only encode used to measure the bitrate at one quality.
pub fn bitrate_sample_args(
    format: &DeviceFormat,
    src: &Path,
    filter_chain: &str,
    fps: TargetFps,
    quality: Quality,
    sample_secs: f64,
    dst: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        "0".to_string(),
        "-t".to_string(),
        format!("{sample_secs}"),
    ];
    push_timestamp_repair(&mut args);
    args.extend([
        "-i".to_string(),
        src.display().to_string(),
        "-vf".to_string(),
        format!("{filter_chain},fps={fps}"),
        "-r".to_string(),
        fps.to_string(),
        "-vsync".to_string(),
        "cfr".to_string(),
    ]);
    args.extend(video_codec_args(format, quality));
    args.push("-an".to_string());
    args.push(dst.display().to_string());
    args
}

/// One preview frame one second into the source.
///
/// `jpeg_quality` selects a lossy JPEG still; `None` leaves the encoder
/// choosing from the output extension (PNG).
pub fn thumbnail_args(src: &Path, filter_chain: &str, jpeg_quality: Option<Quality>, dst: &Path) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        "00:00:01".to_string(),
        "-i".to_string(),
        src.display().to_string(),
        "-vframes".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        filter_chain.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];
    if let Some(q) = jpeg_quality {
        args.push("-q:v".to_string());
        args.push(q.to_string());
    }
    args.push(dst.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    const TV: DeviceFormat = DeviceFormat::TINYTV;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_scale_filters() {
        assert_eq!(
            scale_filter(&TV, ScaleMode::Contain),
            "scale=trunc(iw*min(210/iw\\,135/ih)/2)*2:trunc(ih*min(210/iw\\,135/ih)/2)*2,\
             setsar=1,pad=210:135:(ow-iw)/2:(oh-ih)/2"
        );
        assert_eq!(
            scale_filter(&TV, ScaleMode::Cover),
            "scale=trunc(iw*max(210/iw\\,135/ih)/2)*2:trunc(ih*max(210/iw\\,135/ih)/2)*2,\
             setsar=1,crop=210:135"
        );
        assert_eq!(scale_filter(&TV, ScaleMode::Stretch), "scale=210:135,setsar=1");
    }

    #[test]
    fn test_convert_args_layout() {
        let profile = EncodeProfile {
            fps: TargetFps::Twelve,
            ..EncodeProfile::default()
        };
        let args = convert_args(&profile, Path::new("/in/a.mp4"), Path::new("/out/a.avi"), EncodePass::Initial);

        assert_eq!(&args[..5], ["-hide_banner", "-loglevel", "error", "-stats", "-y"]);
        assert!(!args.iter().any(|a| a == "+genpts"));
        assert_eq!(value_after(&args, "-i"), Some("/in/a.mp4"));
        assert_eq!(
            value_after(&args, "-vf").map(|vf| vf.ends_with(",fps=12")),
            Some(true)
        );
        assert_eq!(value_after(&args, "-r"), Some("12"));
        assert_eq!(value_after(&args, "-vsync"), Some("cfr"));
        assert_eq!(value_after(&args, "-c:v"), Some("mjpeg"));
        assert_eq!(value_after(&args, "-vtag"), Some("MJPG"));
        assert_eq!(value_after(&args, "-q:v"), Some("5"));
        assert_eq!(value_after(&args, "-c:a"), Some("pcm_u8"));
        assert_eq!(value_after(&args, "-ar"), Some("10000"));
        assert_eq!(value_after(&args, "-ac"), Some("1"));
        assert_eq!(value_after(&args, "-af"), None);
        assert_eq!(args.last().map(String::as_str), Some("/out/a.avi"));
    }

    #[test]
    fn test_repair_pass_adds_timestamp_flags_before_input() {
        let profile = EncodeProfile {
            normalize_audio: true,
            ..EncodeProfile::default()
        };
        let args = convert_args(&profile, Path::new("a.mp4"), Path::new("a.tmp_fix.avi"), EncodePass::Repair);
        let genpts = args.iter().position(|a| a == "+genpts").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(genpts < input);
        assert_eq!(value_after(&args, "-copytb"), Some("0"));
        assert_eq!(value_after(&args, "-af"), Some(LOUDNORM_FILTER));
    }

    #[test]
    fn test_filter_graph_for_two_inputs() {
        let graph = concat_filter_graph(&TV, TargetFps::TwentyFour, 2);
        assert_eq!(
            graph,
            "[0:v:0]fps=24,format=yuv420p,setsar=1[v0];\
             [0:a:0]aresample=10000,aformat=sample_fmts=u8:channel_layouts=mono[a0];\
             [1:v:0]fps=24,format=yuv420p,setsar=1[v1];\
             [1:a:0]aresample=10000,aformat=sample_fmts=u8:channel_layouts=mono[a1];\
             [v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]"
        );
    }

    #[test]
    fn test_filter_graph_args_open_every_input() {
        let a = Path::new("a.mp4");
        let b = Path::new("b.mp4");
        let c = Path::new("c.mp4");
        let args = combine_filter_graph_args(&TV, TargetFps::Twelve, Quality::default(), &[a, b, c], Path::new("out.avi"));
        assert_eq!(args.iter().filter(|x| *x == "-i").count(), 3);
        assert_eq!(args.iter().filter(|x| *x == "-map").count(), 2);
        assert_eq!(args.last().map(String::as_str), Some("out.avi"));
    }

    #[test]
    fn test_list_args_use_concat_demuxer() {
        let args = combine_list_args(&TV, TargetFps::Twelve, Quality::default(), Path::new("/tmp/list.txt"), Path::new("o.avi"));
        assert_eq!(value_after(&args, "-f"), Some("concat"));
        assert_eq!(value_after(&args, "-safe"), Some("0"));
        assert_eq!(value_after(&args, "-i"), Some("/tmp/list.txt"));
        assert_eq!(value_after(&args, "-fflags"), Some("+genpts"));
        assert_eq!(value_after(&args, "-vf"), Some("fps=12,format=yuv420p,setsar=1"));
    }

    #[test]
    fn test_direct_args_normalize_only() {
        let args = combine_direct_args(&TV, TargetFps::TwentyFour, Quality::new(9), Path::new("a.mp4"), Path::new("o.avi"));
        assert_eq!(value_after(&args, "-vf"), Some("fps=24,format=yuv420p,setsar=1"));
        assert_eq!(value_after(&args, "-q:v"), Some("9"));
        assert!(!args.iter().any(|a| a == "-filter_complex"));
    }

    #[test]
    fn test_bitrate_sample_is_video_only() {
        let args = bitrate_sample_args(&TV, Path::new("a.mp4"), "scale=210:135,setsar=1", TargetFps::Twelve, Quality::BEST, 2.0, Path::new("s.avi"));
        assert_eq!(value_after(&args, "-t"), Some("2"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=210:135,setsar=1,fps=12"));
        assert_eq!(value_after(&args, "-q:v"), Some("2"));
        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn test_thumbnail_quality_only_for_jpeg() {
        let jpeg = thumbnail_args(Path::new("a.mp4"), "chain", Some(Quality::new(4)), Path::new("t.jpg"));
        assert_eq!(value_after(&jpeg, "-q:v"), Some("4"));
        assert_eq!(value_after(&jpeg, "-ss"), Some("00:00:01"));
        let png = thumbnail_args(Path::new("a.mp4"), "chain", None, Path::new("t.png"));
        assert_eq!(value_after(&png, "-q:v"), None);
    }
}
