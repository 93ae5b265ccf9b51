use tracing::warn;

use crate::error::{Result, TextdubError};
use crate::layout::Layout;
use crate::region::{Detection, TextRegion};

/// One cached region: the translated text region plus its precomputed
/// layout. `layout` is `None` either before the layout pass runs or when the
/// layout degradation path chose to skip the overlay for this region.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub region: TextRegion,
    pub layout: Option<Layout>,
}

/// Scene-lifetime store of recognized regions, their translations, and their
/// layouts, keyed by the recognized source string.
///
/// Created at the first frame of a scene, consumed read-only by the
/// compositor for every frame of the scene, and cleared at scene end.
#[derive(Debug, Default)]
pub struct DetectionCache {
    entries: Vec<(String, CacheEntry)>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents with this scene's detections and their
    /// parallel translations.
    ///
    /// The two slices must have the same count and order; a mismatch is a
    /// translation-service contract violation. Duplicate recognized strings
    /// within a scene collapse to one entry, last write wins.
    pub fn populate(&mut self, detections: Vec<Detection>, translations: Vec<String>) -> Result<()> {
        if detections.len() != translations.len() {
            return Err(TextdubError::Translation(format!(
                "Translation batch returned {} strings for {} regions",
                translations.len(),
                detections.len()
            )));
        }

        self.entries.clear();
        for (detection, translated) in detections.into_iter().zip(translations) {
            let key = detection.text.clone();
            let entry = CacheEntry {
                region: TextRegion::new(detection.quad, detection.text, translated),
                layout: None,
            };
            if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
                warn!("Duplicate recognized string in scene, keeping last: {:?}", key);
                existing.1 = entry;
            } else {
                self.entries.push((key, entry));
            }
        }
        Ok(())
    }

    /// Attach the precomputed layout for one entry. `None` records that the
    /// overlay is skipped for this region.
    pub fn set_layout(&mut self, key: &str, layout: Option<Layout>) {
        if let Some((_, entry)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.layout = layout;
        }
    }

    /// Empty the cache; idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Read-only view of the entries in detection order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Quad;

    fn detection(text: &str, x: i32) -> Detection {
        Detection {
            quad: Quad::from_rect(x, 10, 80, 24),
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_populate_pairs_regions_with_translations() {
        let mut cache = DetectionCache::new();
        cache
            .populate(
                vec![detection("STOP", 0), detection("EXIT", 100)],
                vec!["PARAR".to_string(), "SALIDA".to_string()],
            )
            .unwrap();
        assert_eq!(cache.len(), 2);
        let (_, entry) = cache.entries().next().unwrap();
        assert_eq!(entry.region.source_text, "STOP");
        assert_eq!(entry.region.translated_text, "PARAR");
        assert!(entry.layout.is_none());
    }

    #[test]
    fn test_populate_count_mismatch_is_error() {
        let mut cache = DetectionCache::new();
        let err = cache
            .populate(
                vec![detection("STOP", 0), detection("EXIT", 100)],
                vec!["PARAR".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, TextdubError::Translation(_)));
    }

    #[test]
    fn test_populate_replaces_prior_contents() {
        let mut cache = DetectionCache::new();
        cache
            .populate(vec![detection("OLD", 0)], vec!["ALT".to_string()])
            .unwrap();
        cache
            .populate(vec![detection("NEW", 0)], vec!["NEU".to_string()])
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entries().next().unwrap().0, "NEW");
    }

    #[test]
    fn test_duplicate_keys_collapse_last_write_wins() {
        let mut cache = DetectionCache::new();
        cache
            .populate(
                vec![detection("STOP", 0), detection("STOP", 200)],
                vec!["PARAR".to_string(), "ALTO".to_string()],
            )
            .unwrap();
        assert_eq!(cache.len(), 1);
        let (_, entry) = cache.entries().next().unwrap();
        assert_eq!(entry.region.translated_text, "ALTO");
        assert_eq!(entry.region.quad.top_left().x, 200);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut cache = DetectionCache::new();
        cache
            .populate(vec![detection("STOP", 0)], vec!["PARAR".to_string()])
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_layout_attaches_to_keyed_entry() {
        let mut cache = DetectionCache::new();
        cache
            .populate(vec![detection("STOP", 0)], vec!["PARAR".to_string()])
            .unwrap();
        cache.set_layout(
            "STOP",
            Some(Layout {
                font_size: 16,
                lines: vec!["PARAR".to_string()],
            }),
        );
        let (_, entry) = cache.entries().next().unwrap();
        assert_eq!(entry.layout.as_ref().unwrap().font_size, 16);
    }
}
