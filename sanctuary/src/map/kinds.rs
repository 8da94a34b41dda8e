//! Object kinds and their visual registry.

use super::surface::IconSpec;
use crate::canvas::Rgba;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a type name matches no [`ObjectKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object type: {0}")]
pub struct UnknownObjectKind(pub String);

/// Kinds of map object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Base,
    Quest,
    Npc,
    Monster,
    Poi,
    Hevy,
    Test,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Base,
        ObjectKind::Quest,
        ObjectKind::Npc,
        ObjectKind::Monster,
        ObjectKind::Poi,
        ObjectKind::Hevy,
        ObjectKind::Test,
    ];

    /// Upper-case type name (`BASE`, `QUEST`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Base => "BASE",
            ObjectKind::Quest => "QUEST",
            ObjectKind::Npc => "NPC",
            ObjectKind::Monster => "MONSTER",
            ObjectKind::Poi => "POI",
            ObjectKind::Hevy => "HEVY",
            ObjectKind::Test => "TEST",
        }
    }

    /// Registry entry for this kind.
    pub fn spec(&self) -> &'static ObjectTypeSpec {
        match self {
            ObjectKind::Base => &BASE,
            ObjectKind::Quest => &QUEST,
            ObjectKind::Npc => &NPC,
            ObjectKind::Monster => &MONSTER,
            ObjectKind::Poi => &POI,
            ObjectKind::Hevy => &HEVY,
            ObjectKind::Test => &TEST,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = UnknownObjectKind;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownObjectKind(s.to_string()))
    }
}

/// Visual and LOD description of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTypeSpec {
    pub kind: ObjectKind,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: Rgba,
    /// Layer the marker belongs to.
    pub layer: &'static str,
    /// Diameter in pixels.
    pub size: f32,
    pub z_offset: i32,
    pub description: &'static str,
    pub category: &'static str,
    /// Inclusive zoom range the MapLayer draws this kind in.
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl ObjectTypeSpec {
    pub fn icon_spec(&self, label: Option<String>) -> IconSpec {
        IconSpec {
            icon: self.icon,
            color: self.color,
            size: self.size,
            z_offset: self.z_offset,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            label,
        }
    }
}

const MAX_ZOOM: u8 = 20;

static BASE: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Base,
    name: "Base Marker",
    icon: "🏗️",
    color: Rgba::rgb(0xff, 0x00, 0x00),
    layer: "territory",
    size: 40.0,
    z_offset: 2000,
    description: "Player base and territory marker",
    category: "player",
    min_zoom: 10,
    max_zoom: MAX_ZOOM,
};

static QUEST: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Quest,
    name: "Quest Marker",
    icon: "🎭",
    color: Rgba::rgb(0x00, 0xbf, 0xff),
    layer: "map",
    size: 30.0,
    z_offset: 1500,
    description: "Quest objective and waypoint",
    category: "quest",
    min_zoom: 12,
    max_zoom: MAX_ZOOM,
};

static NPC: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Npc,
    name: "NPC Marker",
    icon: "👑",
    color: Rgba::rgb(0xff, 0xd7, 0x00),
    layer: "map",
    size: 35.0,
    z_offset: 1600,
    description: "Non-player character",
    category: "npc",
    min_zoom: 14,
    max_zoom: MAX_ZOOM,
};

static MONSTER: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Monster,
    name: "Monster Marker",
    icon: "👹",
    color: Rgba::rgb(0x8b, 0x00, 0x00),
    layer: "map",
    size: 32.0,
    z_offset: 1700,
    description: "Hostile creature encounter",
    category: "encounter",
    min_zoom: 14,
    max_zoom: MAX_ZOOM,
};

static POI: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Poi,
    name: "Point of Interest",
    icon: "📍",
    color: Rgba::rgb(0x32, 0xcd, 0x32),
    layer: "map",
    size: 25.0,
    z_offset: 1400,
    description: "Interesting location",
    category: "location",
    min_zoom: 13,
    max_zoom: MAX_ZOOM,
};

static HEVY: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Hevy,
    name: "HEVY Encounter",
    icon: "⚡",
    color: Rgba::rgb(0xff, 0xd7, 0x00),
    layer: "map",
    size: 45.0,
    z_offset: 2500,
    description: "Legendary cosmic guardian",
    category: "legendary",
    min_zoom: 8,
    max_zoom: MAX_ZOOM,
};

static TEST: ObjectTypeSpec = ObjectTypeSpec {
    kind: ObjectKind::Test,
    name: "Test Marker",
    icon: "🧪",
    color: Rgba::rgb(0x00, 0xff, 0x00),
    layer: "map",
    size: 30.0,
    z_offset: 1000,
    description: "Debug and testing marker",
    category: "debug",
    min_zoom: 0,
    max_zoom: MAX_ZOOM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("monster".parse::<ObjectKind>(), Ok(ObjectKind::Monster));
        assert_eq!(" HEVY ".parse::<ObjectKind>(), Ok(ObjectKind::Hevy));
        assert_eq!(
            "DRAGON".parse::<ObjectKind>(),
            Err(UnknownObjectKind("DRAGON".to_string()))
        );
    }

    #[test]
    fn test_every_kind_has_matching_spec() {
        for kind in ObjectKind::ALL {
            let spec = kind.spec();
            assert_eq!(spec.kind, kind);
            assert!(spec.min_zoom <= spec.max_zoom);
            assert!(spec.size > 0.0);
        }
    }

    #[test]
    fn test_registry_colors() {
        assert_eq!(ObjectKind::Base.spec().color, Rgba::from_hex("#ff0000").unwrap());
        assert_eq!(ObjectKind::Quest.spec().color, Rgba::from_hex("#00bfff").unwrap());
        assert_eq!(ObjectKind::Hevy.spec().z_offset, 2500);
    }
}
