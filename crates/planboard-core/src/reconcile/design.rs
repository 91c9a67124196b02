use serde_json::Value;

use super::{StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{Node, NodePayload, PalettePayload, StageId, TypographyPayload};

/// Brand palette and typography singletons.
pub struct DesignReconciler;

const PALETTE_KEYS: [&str; 3] = ["colors", "palette", "colorPalette"];

fn palette(data: &Value) -> PalettePayload {
    match PALETTE_KEYS.iter().find_map(|key| extract::field(data, key)) {
        Some(colors @ Value::Object(_)) => PalettePayload {
            primary: extract::text(colors, &["primary"]),
            secondary: extract::text(colors, &["secondary"]),
            accent: extract::text(colors, &["accent"]),
            background: extract::text(colors, &["background"]),
            text: extract::text(colors, &["text", "foreground"]),
        },
        // A bare list of colors fills the slots in order.
        Some(Value::Array(_)) => {
            let mut colors = PALETTE_KEYS
                .iter()
                .map(|key| extract::strings(data, &[key]))
                .find(|list| !list.is_empty())
                .unwrap_or_default()
                .into_iter();
            PalettePayload {
                primary: colors.next(),
                secondary: colors.next(),
                accent: colors.next(),
                background: colors.next(),
                text: colors.next(),
            }
        }
        _ => PalettePayload::default(),
    }
}

fn typography(data: &Value) -> TypographyPayload {
    let Some(t) = extract::object(data, &["typography", "fonts"]) else {
        return TypographyPayload::default();
    };
    TypographyPayload {
        heading_font: extract::text(t, &["headingFont", "heading"]),
        body_font: extract::text(t, &["bodyFont", "body"]),
        base_size: extract::number(t, &["baseSize", "fontSize"]),
    }
}

impl StageReconciler for DesignReconciler {
    fn stage(&self) -> StageId {
        StageId::Design
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();
        let palette = palette(data);
        if !palette.is_empty() {
            out.entities.push(Entity::singleton(NodePayload::ColorPalette(palette)));
        }
        let typography = typography(data);
        if !typography.is_empty() {
            out.entities.push(Entity::singleton(NodePayload::Typography(typography)));
        }
        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        let (key, aliases): (&str, &[&str]) = match &node.payload {
            NodePayload::ColorPalette(_) => ("colors", &PALETTE_KEYS),
            NodePayload::Typography(_) => ("typography", &["typography", "fonts"]),
            _ => return false,
        };
        let map = extract::ensure_object(data);
        for alias in aliases {
            extract::remove_field(map, alias);
        }
        map.insert(key.to_string(), node.payload.data_value());
        true
    }
}
