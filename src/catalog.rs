//! # Product Catalog
//!
//! Uploaded product images and their AI-derived descriptions.
//!
//! Ingest is batch-atomic: every upload in a batch is described concurrently
//! and the entries are appended only if every request succeeds. The one
//! tolerated per-item failure is malformed upload data, which gets
//! [`FALLBACK_DESCRIPTION`] without a request.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{Result, RoomstageError};
use crate::media::ImageData;
use crate::service::DescriptionService;

/// Fixed instruction sent with every description request.
pub const DESCRIBE_INSTRUCTION: &str = "Describe this product in a short phrase suitable for \
     an interior design prompt, for example \"a green velvet armchair\" or \"a brass floor lamp\". \
     Respond with the phrase only, with no preamble or punctuation.";

/// Description used for uploads that cannot be sent to the service.
pub const FALLBACK_DESCRIPTION: &str = "a product";

/// Index of an entry in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub usize);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded product image with its description.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub image: ImageData,
    pub description: String,
    /// Natural pixel size, if the header could be read.
    pub natural_size: Option<(u32, u32)>,
}

impl CatalogEntry {
    pub fn new(image: ImageData, description: impl Into<String>) -> Self {
        let natural_size = image.dimensions();
        Self {
            image,
            description: description.into(),
            natural_size,
        }
    }
}

/// Append-only list of catalog entries.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ProductId) -> Option<&CatalogEntry> {
        self.entries.get(id.0)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a completed batch; returns the ids assigned to it.
    pub fn extend(&mut self, batch: Vec<CatalogEntry>) -> Vec<ProductId> {
        let start = self.entries.len();
        self.entries.extend(batch);
        (start..self.entries.len()).map(ProductId).collect()
    }
}

/// Describe a batch of uploads.
///
/// Requests run concurrently; the returned entries are in input order. If any
/// request fails, the remaining ones are aborted and the whole batch fails.
pub async fn describe_batch(
    service: Arc<dyn DescriptionService>,
    uploads: Vec<ImageData>,
) -> Result<Vec<CatalogEntry>> {
    let mut slots: Vec<Option<CatalogEntry>> = vec![None; uploads.len()];
    let mut tasks = JoinSet::new();

    for (index, image) in uploads.into_iter().enumerate() {
        if !image.is_transmittable() {
            debug!(index, "upload is not a recognised image, using fallback description");
            slots[index] = Some(CatalogEntry::new(image, FALLBACK_DESCRIPTION));
            continue;
        }

        let service = Arc::clone(&service);
        tasks.spawn(async move {
            let description = service.describe(&image, DESCRIBE_INSTRUCTION).await?;
            Ok::<_, RoomstageError>((index, CatalogEntry::new(image, description)))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| RoomstageError::Description(format!("Description task failed: {}", e)))
            .and_then(|r| r.map_err(|e| RoomstageError::Description(e.to_string())));

        match outcome {
            Ok((index, entry)) => slots[index] = Some(entry),
            Err(e) => {
                error!("Product description batch aborted: {}", e);
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    let entries: Vec<CatalogEntry> = slots.into_iter().flatten().collect();
    info!(count = entries.len(), "Described product batch");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_support::solid_png;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers "product N" for the Nth call, failing on a chosen image width.
    struct ScriptedDescriber {
        calls: AtomicUsize,
        fail_width: Option<u32>,
    }

    #[async_trait]
    impl DescriptionService for ScriptedDescriber {
        async fn describe(&self, image: &ImageData, instruction: &str) -> Result<String> {
            assert_eq!(instruction, DESCRIBE_INSTRUCTION);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (w, _) = image.dimensions().unwrap();
            // Make earlier uploads finish later to exercise ordering.
            tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(w as u64 * 10))).await;
            if Some(w) == self.fail_width {
                return Err(RoomstageError::Service("boom".to_string()));
            }
            Ok(format!("product {}", w))
        }
    }

    fn describer(fail_width: Option<u32>) -> Arc<ScriptedDescriber> {
        Arc::new(ScriptedDescriber {
            calls: AtomicUsize::new(0),
            fail_width,
        })
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let service = describer(None);
        let uploads = vec![
            solid_png(1, 1, [0, 0, 0, 255]),
            solid_png(2, 1, [0, 0, 0, 255]),
            solid_png(3, 1, [0, 0, 0, 255]),
        ];
        let entries = describe_batch(service.clone(), uploads).await.unwrap();
        let descriptions: Vec<_> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["product 1", "product 2", "product 3"]);
        assert_eq!(entries[2].natural_size, Some((3, 1)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_fails_atomically() {
        let uploads = vec![
            solid_png(1, 1, [0, 0, 0, 255]),
            solid_png(2, 1, [0, 0, 0, 255]),
            solid_png(3, 1, [0, 0, 0, 255]),
        ];
        let err = describe_batch(describer(Some(2)), uploads).await.unwrap_err();
        assert!(matches!(err, RoomstageError::Description(_)));
    }

    #[tokio::test]
    async fn test_malformed_upload_gets_fallback() {
        let service = describer(None);
        let uploads = vec![
            ImageData::sniff(b"not an image".to_vec()),
            solid_png(1, 1, [0, 0, 0, 255]),
        ];
        let entries = describe_batch(service.clone(), uploads).await.unwrap();
        assert_eq!(entries[0].description, FALLBACK_DESCRIPTION);
        assert_eq!(entries[0].natural_size, None);
        assert_eq!(entries[1].description, "product 1");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extend_assigns_sequential_ids() {
        let mut catalog = Catalog::new();
        let first = catalog.extend(vec![CatalogEntry::new(solid_png(1, 1, [0; 4]), "a")]);
        let second = catalog.extend(vec![
            CatalogEntry::new(solid_png(1, 1, [0; 4]), "b"),
            CatalogEntry::new(solid_png(1, 1, [0; 4]), "c"),
        ]);
        assert_eq!(first, vec![ProductId(0)]);
        assert_eq!(second, vec![ProductId(1), ProductId(2)]);
        assert_eq!(catalog.get(ProductId(2)).unwrap().description, "c");
        assert!(catalog.get(ProductId(3)).is_none());
    }
}
