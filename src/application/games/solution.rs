use guesssenpai_api_types::{SolutionPayload, SolutionStreamingLink, SolutionTitles};

use crate::domain::media::MediaItem;
use crate::domain::redaction::strip_markup;

const SYNOPSIS_PREVIEW_CHARS: usize = 280;
const ELLIPSIS: char = '…';

/// Streaming sites that may be linked from a solution card.
pub const STREAMING_SITES: [&str; 9] = [
    "Amazon Prime Video",
    "Bilibili",
    "Crunchyroll",
    "Disney+",
    "Funimation",
    "HIDIVE",
    "Hulu",
    "Netflix",
    "YouTube",
];

pub fn catalog_url(media: &MediaItem) -> String {
    format!("https://anilist.co/anime/{}", media.id)
}

/// Cut at the last space before the limit, or hard at the limit when the
/// first word alone is longer.
fn preview(text: &str) -> String {
    let Some((limit, _)) = text.char_indices().nth(SYNOPSIS_PREVIEW_CHARS) else {
        return text.to_string();
    };
    let head = &text[..limit];
    let cutoff = match head.rfind(' ') {
        Some(index) if index > 0 => index,
        _ => limit,
    };
    let mut trimmed = text[..cutoff].trim_end().to_string();
    trimmed.push(ELLIPSIS);
    trimmed
}

/// Canonical answer card shown once a game is solved.
pub fn build_solution(media: &MediaItem) -> SolutionPayload {
    let synopsis = media
        .description
        .as_deref()
        .map(|description| strip_markup(description).trim().to_string())
        .filter(|clean| !clean.is_empty())
        .map(|clean| preview(&clean));

    let streaming_links = media
        .external_links
        .iter()
        .filter_map(|link| match (link.site.as_deref(), link.url.as_deref()) {
            (Some(site), Some(url)) if !url.is_empty() && STREAMING_SITES.contains(&site) => {
                Some(SolutionStreamingLink {
                    site: site.to_string(),
                    url: url.to_string(),
                })
            }
            _ => None,
        })
        .collect();

    SolutionPayload {
        titles: SolutionTitles {
            romaji: media.title.romaji.clone(),
            english: media.title.english.clone(),
            native: media.title.native.clone(),
            user_preferred: media.title.user_preferred.clone(),
        },
        cover_image: media.best_image_url().map(str::to_string),
        synopsis,
        ani_list_url: catalog_url(media),
        streaming_links,
    }
}
