//! HLS master playlist construction.
//!
//! The playlist is derived strictly from the renditions actually produced,
//! in produced order (highest quality first), never from the static
//! catalog, so an entry can never point at a file that does not exist.

use std::fmt::Write as _;
use std::path::Path;

use coursecast_core::asset::RenditionDescriptor;
use tracing::info;

use crate::PipelineError;

pub const MANIFEST_FILENAME: &str = "master.m3u8";

/// Render the playlist text. Deterministic: the same rendition list always
/// yields byte-identical output.
pub fn render(renditions: &[RenditionDescriptor]) -> Result<String, PipelineError> {
    if renditions.is_empty() {
        return Err(PipelineError::ManifestWrite(
            "no renditions were produced".into(),
        ));
    }

    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for r in renditions {
        let bandwidth = (r.video_kbps as u64 + r.audio_kbps as u64) * 1000;
        let filename = Path::new(&r.path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::ManifestWrite(format!("rendition has no filename: {}", r.path))
            })?;
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={}x{}",
            r.width, r.height
        );
        let _ = writeln!(out, "{filename}");
    }
    Ok(out)
}

/// Render and persist the playlist next to the renditions. Returns the
/// manifest path.
pub async fn write(
    output_dir: &Path,
    renditions: &[RenditionDescriptor],
) -> Result<String, PipelineError> {
    let content = render(renditions)?;
    let path = output_dir.join(MANIFEST_FILENAME);
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| PipelineError::ManifestWrite(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), entries = renditions.len(), "manifest written");
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(tier: &str, w: u32, h: u32, v: u32, a: u32) -> RenditionDescriptor {
        RenditionDescriptor {
            tier: tier.to_string(),
            width: w,
            height: h,
            video_kbps: v,
            audio_kbps: a,
            fps: 30,
            path: format!("/srv/out/{tier}.mp4"),
        }
    }

    #[test]
    fn exact_layout_for_three_tiers() {
        let renditions = vec![
            rendition("720p", 1280, 720, 2800, 128),
            rendition("480p", 854, 480, 1400, 128),
            rendition("360p", 640, 360, 800, 96),
        ];
        let expected = "#EXTM3U\n\
                        #EXT-X-VERSION:3\n\
                        #EXT-X-STREAM-INF:BANDWIDTH=2928000,RESOLUTION=1280x720\n\
                        720p.mp4\n\
                        #EXT-X-STREAM-INF:BANDWIDTH=1528000,RESOLUTION=854x480\n\
                        480p.mp4\n\
                        #EXT-X-STREAM-INF:BANDWIDTH=896000,RESOLUTION=640x360\n\
                        360p.mp4\n";
        assert_eq!(render(&renditions).unwrap(), expected);
    }

    #[test]
    fn rendering_is_idempotent() {
        let renditions = vec![
            rendition("1080p", 1920, 1080, 5000, 192),
            rendition("360p", 640, 360, 800, 96),
        ];
        assert_eq!(render(&renditions).unwrap(), render(&renditions).unwrap());
    }

    #[test]
    fn entries_match_input_exactly() {
        // one produced rendition → one entry, nothing from the catalog
        let renditions = vec![rendition("native", 480, 270, 800, 96)];
        let m = render(&renditions).unwrap();
        assert_eq!(m.matches("#EXT-X-STREAM-INF").count(), 1);
        assert!(m.contains("native.mp4"));
        assert!(!m.contains("720p"));
    }

    #[test]
    fn empty_rendition_set_is_an_error() {
        assert!(matches!(
            render(&[]),
            Err(PipelineError::ManifestWrite(_))
        ));
    }

    #[tokio::test]
    async fn write_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let renditions = vec![rendition("360p", 640, 360, 800, 96)];
        let path = write(dir.path(), &renditions).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, render(&renditions).unwrap());
        assert!(path.ends_with("master.m3u8"));
    }
}
