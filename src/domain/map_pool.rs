use serde::{Deserialize, Serialize};

/// A named, ordered pool of map identifiers a session can draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPool {
    pub name: String,
    pub maps: Vec<String>,
}

impl MapPool {
    pub fn new(name: impl Into<String>, maps: Vec<String>) -> Self {
        Self {
            name: name.into(),
            maps,
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

static BUILTIN_POOLS: once_cell::sync::Lazy<Vec<MapPool>> = once_cell::sync::Lazy::new(|| {
    vec![
        MapPool::new(
            "All Maps",
            [
                "Bank",
                "Bartlett U.",
                "Border",
                "Chalet",
                "Club House",
                "Coastline",
                "Consulate",
                "Favelas",
                "Hereford Base",
                "House",
                "Kafe Dostoyevsky",
                "Kanal",
                "Oregon",
                "Plane",
                "Skyscraper",
                "Theme Park",
                "Yacht",
            ]
            .map(String::from)
            .to_vec(),
        ),
        MapPool::new(
            "ESL Maps",
            [
                "Bank",
                "Border",
                "Chalet",
                "Club House",
                "Coastline",
                "Consulate",
                "Kafe Dostoyevsky",
                "Oregon",
                "Skyscraper",
            ]
            .map(String::from)
            .to_vec(),
        ),
    ]
});

/// The pools shipped with the bot. Extra pools can be added through the
/// settings store under the `map_pools` key.
pub fn builtin_pools() -> Vec<MapPool> {
    BUILTIN_POOLS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pools() {
        let pools = builtin_pools();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name, "All Maps");
        assert_eq!(pools[0].len(), 17);
        assert_eq!(pools[1].name, "ESL Maps");
        assert_eq!(pools[1].len(), 9);
    }

    #[test]
    fn test_pool_serde_round_trip() {
        let pool = MapPool::new("Customs", vec!["Bank".into(), "Oregon".into()]);
        let json = serde_json::to_value(&pool).unwrap();
        let back: MapPool = serde_json::from_value(json).unwrap();
        assert_eq!(back, pool);
    }
}
