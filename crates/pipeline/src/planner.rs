use coursecast_core::catalog::{self, NATIVE_TIER, QUALITY_CATALOG, QualityProfile};

use crate::ffprobe::SourceInfo;

/// One planned encode. Concrete numbers rather than a catalog reference, so
/// the synthesized native tier needs no special casing downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionJob {
    pub tier: String,
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub fps: u32,
    pub filename: String,
}

impl RenditionJob {
    fn from_profile(p: &QualityProfile) -> Self {
        Self {
            tier: p.name.to_string(),
            width: p.width,
            height: p.height,
            video_kbps: p.video_kbps,
            audio_kbps: p.audio_kbps,
            fps: p.fps,
            filename: format!("{}.mp4", p.name),
        }
    }
}

/// Decide which tiers to produce. A tier qualifies only when the source
/// covers it in both dimensions (never upscale). Tiers come out in catalog
/// order, highest first, so an interrupted run leaves the best renditions
/// behind. When nothing qualifies, one native rendition at the source's own
/// (even-floored) resolution is planned instead.
pub fn plan(source: &SourceInfo, tier_filter: Option<&[String]>) -> Vec<RenditionJob> {
    let mut jobs: Vec<RenditionJob> = QUALITY_CATALOG
        .iter()
        .filter(|p| match tier_filter {
            Some(names) => names.iter().any(|n| n == p.name),
            None => true,
        })
        .filter(|p| source.width >= p.width && source.height >= p.height)
        .map(RenditionJob::from_profile)
        .collect();

    if jobs.is_empty() {
        jobs.push(native_job(source));
    }

    jobs
}

fn native_job(source: &SourceInfo) -> RenditionJob {
    let low = catalog::lowest();
    RenditionJob {
        tier: NATIVE_TIER.to_string(),
        // encoders want even dimensions
        width: source.width & !1,
        height: source.height & !1,
        video_kbps: low.video_kbps,
        audio_kbps: low.audio_kbps,
        fps: low.fps,
        filename: format!("{NATIVE_TIER}.mp4"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32) -> SourceInfo {
        SourceInfo {
            duration_secs: 60.0,
            width,
            height,
            bitrate_kbps: Some(4000),
            fps: Some(29.97),
            codec: "h264".into(),
        }
    }

    #[test]
    fn full_hd_source_gets_all_four_tiers() {
        let jobs = plan(&source(1920, 1080), None);
        let tiers: Vec<&str> = jobs.iter().map(|j| j.tier.as_str()).collect();
        assert_eq!(tiers, ["1080p", "720p", "480p", "360p"]);
    }

    #[test]
    fn hd_source_skips_1080p() {
        let jobs = plan(&source(1280, 720), None);
        let tiers: Vec<&str> = jobs.iter().map(|j| j.tier.as_str()).collect();
        assert_eq!(tiers, ["720p", "480p", "360p"]);
    }

    #[test]
    fn never_upscales() {
        for (w, h) in [(1920, 1080), (1280, 720), (854, 480), (640, 360), (320, 240)] {
            for job in plan(&source(w, h), None) {
                assert!(job.width <= w, "{} exceeds source width", job.tier);
                assert!(job.height <= h, "{} exceeds source height", job.tier);
            }
        }
    }

    #[test]
    fn small_source_gets_exactly_one_native_tier() {
        let jobs = plan(&source(640, 360), None);
        // 360p matches exactly, so it qualifies
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].tier, "360p");

        let jobs = plan(&source(480, 270), None);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].tier, "native");
        assert_eq!((jobs[0].width, jobs[0].height), (480, 270 & !1));
        assert_eq!(jobs[0].video_kbps, 800);
        assert_eq!(jobs[0].filename, "native.mp4");
    }

    #[test]
    fn native_dimensions_are_even() {
        let jobs = plan(&source(639, 359), None);
        assert_eq!((jobs[0].width, jobs[0].height), (638, 358));
    }

    #[test]
    fn tier_filter_restricts_catalog() {
        let names = vec!["720p".to_string(), "360p".to_string()];
        let jobs = plan(&source(1920, 1080), Some(&names));
        let tiers: Vec<&str> = jobs.iter().map(|j| j.tier.as_str()).collect();
        assert_eq!(tiers, ["720p", "360p"]);
    }

    #[test]
    fn ordering_is_highest_quality_first() {
        let jobs = plan(&source(1920, 1080), None);
        for pair in jobs.windows(2) {
            assert!(pair[0].video_kbps > pair[1].video_kbps);
        }
    }
}
