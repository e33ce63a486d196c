//! Addressable form of a selection: `.../saison-{n}/episode-{m}`.
//!
//! Numbers are the catalog's human-readable season/episode numbers, never ids.

const SEASON_SEGMENT: &str = "saison-";
const EPISODE_SEGMENT: &str = "episode-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSelection {
    pub season_number: u32,
    pub episode_number: Option<u32>,
}

pub fn route_path(base: &str, season_number: u32, episode_number: u32) -> String {
    let base = base.trim_end_matches('/');
    format!("{base}/{SEASON_SEGMENT}{season_number}/{EPISODE_SEGMENT}{episode_number}")
}

/// Find the last `saison-N` segment of a path and an `episode-M` segment
/// directly after it. Anything before the season segment is ignored.
pub fn parse_route(path: &str) -> Option<RouteSelection> {
    let segments: Vec<&str> = path
        .split(['/', '?', '#'])
        .filter(|segment| !segment.is_empty())
        .collect();
    let season_pos = segments
        .iter()
        .rposition(|segment| segment.starts_with(SEASON_SEGMENT))?;
    let season_number = parse_number_segment(segments[season_pos], SEASON_SEGMENT)?;
    let episode_number = segments
        .get(season_pos + 1)
        .and_then(|segment| parse_number_segment(segment, EPISODE_SEGMENT));
    Some(RouteSelection {
        season_number,
        episode_number,
    })
}

fn parse_number_segment(segment: &str, prefix: &str) -> Option<u32> {
    segment.strip_prefix(prefix)?.parse::<u32>().ok()
}
