//! Card catalog record.
//!
//! # Responsibility
//! - Mirror the remote catalog schema for one printed card.
//! - Resolve the image reference and orientation used by renderers.
//!
//! # Invariants
//! - `id` is assigned by the remote store and never reused.
//! - `scryfall_id` identifies the printing upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Remote-store identity of one card.
pub type CardId = i64;

/// Canonical color order used to build `color_sort_key`.
const COLOR_ORDER: [&str; 5] = ["W", "U", "B", "R", "G"];
/// Image sizes tried after `normal` when no face image exists.
const FALLBACK_IMAGE_SIZES: [ImageSize; 5] = [
    ImageSize::Large,
    ImageSize::BorderCrop,
    ImageSize::ArtCrop,
    ImageSize::Png,
    ImageSize::Small,
];
const FLIPPABLE_LAYOUTS: [&str; 3] = ["transform", "modal_dfc", "reversible_card"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageSize {
    Large,
    BorderCrop,
    ArtCrop,
    Png,
    Small,
}

/// Image URLs keyed by rendition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub png: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
}

impl ImageUris {
    fn get(&self, size: ImageSize) -> Option<&str> {
        let value = match size {
            ImageSize::Large => &self.large,
            ImageSize::BorderCrop => &self.border_crop,
            ImageSize::ArtCrop => &self.art_crop,
            ImageSize::Png => &self.png,
            ImageSize::Small => &self.small,
        };
        non_empty(value)
    }
}

/// One face of a multi-faced card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

/// Immutable catalog record for one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub scryfall_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub cmc: Option<f64>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
    /// Server-derived; see [`Card::derived_num_colors`].
    #[serde(default)]
    pub num_colors: Option<i64>,
    /// Server-derived; see [`Card::derived_color_sort_key`].
    #[serde(default)]
    pub color_sort_key: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_deviation: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub image_uris: ImageUris,
    #[serde(default)]
    pub card_faces: Vec<CardFace>,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_layout() -> String {
    "normal".to_string()
}

impl Card {
    /// Creates a card with only identity fields set.
    pub fn new(id: CardId, scryfall_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            scryfall_id,
            name: name.into(),
            mana_cost: None,
            cmc: None,
            type_line: None,
            oracle_text: None,
            power: None,
            toughness: None,
            colors: Vec::new(),
            color_identity: Vec::new(),
            keywords: Vec::new(),
            image_filename: None,
            num_colors: None,
            color_sort_key: None,
            rating: None,
            rating_deviation: None,
            volatility: None,
            image_uris: ImageUris::default(),
            card_faces: Vec::new(),
            layout: default_layout(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Sets color identity, e.g. `["U", "W"]`.
    pub fn with_color_identity<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.color_identity = colors.into_iter().map(Into::into).collect();
        self
    }

    /// Sets converted mana cost.
    pub fn with_cmc(mut self, cmc: f64) -> Self {
        self.cmc = Some(cmc);
        self
    }

    /// Number of distinct recognized colors in the color identity.
    pub fn derived_num_colors(&self) -> i64 {
        self.color_positions().len() as i64
    }

    /// Color identity rendered in WUBRG order, e.g. `"WU"`; empty when colorless.
    ///
    /// Unknown color symbols are ignored.
    pub fn derived_color_sort_key(&self) -> String {
        self.color_positions()
            .into_iter()
            .map(|index| COLOR_ORDER[index])
            .collect()
    }

    fn color_positions(&self) -> Vec<usize> {
        let mut positions = self
            .color_identity
            .iter()
            .filter_map(|color| {
                let normalized = color.trim().to_ascii_uppercase();
                COLOR_ORDER.iter().position(|known| *known == normalized)
            })
            .collect::<Vec<_>>();
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// Resolves the display image for one face.
    ///
    /// Face images win over the card-level image; `normal` wins over the
    /// remaining sizes. Returns `None` when nothing usable is present.
    pub fn image_uri(&self, face: usize) -> Option<&str> {
        let face_image = self
            .card_faces
            .get(face)
            .and_then(|face| face.image_uris.as_ref())
            .and_then(|uris| non_empty(&uris.normal));
        if face_image.is_some() {
            return face_image;
        }

        if let Some(normal) = non_empty(&self.image_uris.normal) {
            return Some(normal);
        }
        FALLBACK_IMAGE_SIZES
            .iter()
            .find_map(|size| self.image_uris.get(*size))
    }

    pub fn has_multiple_faces(&self) -> bool {
        self.card_faces.len() > 1
    }

    /// Whether faces are shown one at a time (transform-style layouts).
    pub fn has_flippable_faces(&self) -> bool {
        self.has_multiple_faces() && FLIPPABLE_LAYOUTS.contains(&self.layout.as_str())
    }

    /// Clockwise rotation in degrees the card needs to read upright.
    pub fn rotation_angle(&self) -> u16 {
        match self.layout.as_str() {
            "battle" => 90,
            "flip" => 180,
            _ => 0,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{Card, CardFace, ImageUris};
    use uuid::Uuid;

    fn card() -> Card {
        Card::new(1, Uuid::nil(), "Test Card")
    }

    #[test]
    fn color_sort_key_uses_wubrg_order_and_ignores_unknown_symbols() {
        let card = card().with_color_identity(["G", "w", "U", "X", "W"]);
        assert_eq!(card.derived_color_sort_key(), "WUG");
        assert_eq!(card.derived_num_colors(), 3);
    }

    #[test]
    fn colorless_card_has_empty_sort_key() {
        assert_eq!(card().derived_color_sort_key(), "");
        assert_eq!(card().derived_num_colors(), 0);
    }

    #[test]
    fn image_uri_prefers_face_then_normal_then_fallbacks() {
        let mut card = card();
        assert_eq!(card.image_uri(0), None);

        card.image_uris.small = Some("small.jpg".to_string());
        card.image_uris.art_crop = Some("art.jpg".to_string());
        assert_eq!(card.image_uri(0), Some("art.jpg"));

        card.image_uris.normal = Some("normal.jpg".to_string());
        assert_eq!(card.image_uri(0), Some("normal.jpg"));

        card.card_faces = vec![
            CardFace {
                name: Some("Front".to_string()),
                image_uris: Some(ImageUris {
                    normal: Some("front.jpg".to_string()),
                    ..ImageUris::default()
                }),
            },
            CardFace::default(),
        ];
        assert_eq!(card.image_uri(0), Some("front.jpg"));
        assert_eq!(card.image_uri(1), Some("normal.jpg"));
    }

    #[test]
    fn flippable_faces_require_transform_style_layout() {
        let mut card = card();
        card.card_faces = vec![CardFace::default(), CardFace::default()];
        card.layout = "split".to_string();
        assert!(card.has_multiple_faces());
        assert!(!card.has_flippable_faces());

        card.layout = "modal_dfc".to_string();
        assert!(card.has_flippable_faces());
    }

    #[test]
    fn rotation_angle_depends_on_layout() {
        let mut card = card();
        assert_eq!(card.rotation_angle(), 0);
        card.layout = "battle".to_string();
        assert_eq!(card.rotation_angle(), 90);
        card.layout = "flip".to_string();
        assert_eq!(card.rotation_angle(), 180);
    }
}
