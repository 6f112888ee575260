use guesssenpai_api_types::{PosterCropStage, PosterZoomGame, PosterZoomMeta, RoundSpec};

use crate::domain::media::MediaItem;
use crate::domain::poster::crop_stages;

pub fn poster_rounds() -> Vec<RoundSpec> {
    vec![
        RoundSpec::new(1, &[]),
        RoundSpec::new(2, &["genres"]),
        RoundSpec::new(3, &["year", "format"]),
    ]
}

pub fn build_poster(media: &MediaItem) -> PosterZoomGame {
    let crop_stages = crop_stages(media)
        .into_iter()
        .map(|stage| PosterCropStage {
            scale: stage.scale,
            offset_x: stage.offset_x,
            offset_y: stage.offset_y,
        })
        .collect();

    PosterZoomGame {
        spec: poster_rounds(),
        answer: media.canonical_title().to_string(),
        image: media.best_image_url().map(str::to_string),
        meta: PosterZoomMeta {
            genres: media
                .genres
                .iter()
                .filter(|genre| !genre.is_empty())
                .cloned()
                .collect(),
            year: media.release_year(),
            format: media.format.clone(),
        },
        crop_stages,
    }
}
