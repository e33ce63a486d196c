use crate::catalog::Title;
use crate::playback::EpisodeRef;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn kind_label(title: &Title) -> &'static str {
    if title.has_seasons() { "series" } else { "film" }
}

/// `S2E1` style label for an episode reference, resolved against the title.
pub(crate) fn episode_code(title: &Title, season_id: &str, episode_id: &str) -> Option<String> {
    let season = title.seasons().iter().find(|season| season.id == season_id)?;
    let episode = season
        .episodes
        .iter()
        .find(|episode| episode.id == episode_id)?;
    Some(format!("S{}E{}", season.number, episode.number))
}

pub(crate) fn describe_next(title: &Title, next: Option<&EpisodeRef>) -> String {
    next.and_then(|next| episode_code(title, &next.season_id, &next.episode_id))
        .unwrap_or_else(|| "-".to_string())
}

/// Source buttons are numbered from 1 on screen.
pub(crate) fn source_label(index: usize, url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url);
    format!("{} {}", index + 1, truncate(host, 24))
}
