//! Asset path handling for keyframe files.
//!
//! Every keyframe lives at a relative path of the form
//! `<root>/Keyframes_<batch>/keyframes/<video_id>/<frame_no>.jpg`, where
//! `<frame_no>` is 1-based and zero-padded to three digits. The video id
//! (e.g. `L21_V001`) is the parent directory name; the batch is the leading
//! `_`-component of the video id. All paths handed out by the engine use
//! forward slashes regardless of how they were stored.

/// Canonicalize a stored path to forward slashes.
#[must_use]
pub fn canonicalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Parent directory name of a keyframe path, i.e. the video id.
#[must_use]
pub fn video_id_of(path: &str) -> Option<&str> {
    let mut parts = path.rsplit('/');
    let _file = parts.next()?;
    let video = parts.next()?;
    if video.is_empty() { None } else { Some(video) }
}

/// Leading `_`-component of a video id, e.g. `L21` for `L21_V001`.
#[must_use]
pub fn batch_of(video_id: &str) -> &str {
    video_id.split('_').next().unwrap_or(video_id)
}

/// 1-based frame number recovered from the zero-padded file stem.
/// Returns `None` when the stem is not numeric.
#[must_use]
pub fn frame_no_of(path: &str) -> Option<u32> {
    let file = path.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map_or(file, |x| x.0);
    stem.parse::<u32>().ok()
}

/// File name of the keyframe at 0-based row `row`, e.g. `003.jpg` for row 2.
#[must_use]
pub fn frame_file_name(row: usize) -> String {
    format!("{:03}.jpg", row + 1)
}

/// Relative keyframe path constructed from a video id and a 0-based row,
/// without a corpus root prefix.
#[must_use]
pub fn keyframe_path(video_id: &str, row: usize) -> String {
    format!(
        "Keyframes_{}/keyframes/{}/{}",
        batch_of(video_id),
        video_id,
        frame_file_name(row)
    )
}
