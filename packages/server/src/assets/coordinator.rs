use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::media::{
    AssetClass, CompressionOutcome, ImageKind, UploadCandidate, maybe_compress, read_dimensions,
    validate_upload,
};
use common::storage::{BlobStore, ObjectRef};
use common::MediaConfig;
use futures::future::join_all;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::catalog::{AssetCatalog, NewAsset, SwapOutcome};
use super::error::AssetError;
use super::report::{AssetListing, BatchReport, ItemFailure, OperationStage};
use super::sweep::{SweepReport, sweep_orphans};
use crate::entity::business_asset;

/// Maximum number of ids accepted by one bulk delete.
pub const MAX_BULK_DELETE: usize = 100;

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    /// Declared MIME type. May be empty; the extension is consulted then.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Validated and possibly compressed image, ready to store.
struct PreparedImage {
    file_name: String,
    kind: ImageKind,
    bytes: Vec<u8>,
    dimensions: Option<(u32, u32)>,
}

/// Sequences every mutation of business media across the object store and
/// the catalog.
///
/// Ordering rules:
/// - uploads store bytes before writing the catalog row
/// - deletes remove bytes before removing the catalog row
/// - a displaced primary is removed only after the swap has committed
#[derive(Clone)]
pub struct AssetManager {
    db: DatabaseConnection,
    store: Arc<dyn BlobStore>,
    media: Arc<MediaConfig>,
}

impl AssetManager {
    pub fn new(db: DatabaseConnection, store: Arc<dyn BlobStore>, media: MediaConfig) -> Self {
        Self {
            db,
            store,
            media: Arc::new(media),
        }
    }

    pub fn media(&self) -> &MediaConfig {
        &self.media
    }

    /// Current assets of a business in display order.
    pub async fn list_assets(&self, business_id: Uuid) -> Result<AssetListing, AssetError> {
        self.listing(business_id, Vec::new()).await
    }

    /// Upload a new primary image and retire the previous one.
    ///
    /// The new image is primary once this returns `Ok`. A failure to remove
    /// the displaced image is reported in `warnings` and does not fail the
    /// upload.
    #[instrument(skip(self, business_name, file), fields(file = %file.file_name))]
    pub async fn upload_logo(
        &self,
        business_id: Uuid,
        business_name: &str,
        file: UploadFile,
    ) -> Result<AssetListing, AssetError> {
        let prepared = self.prepare(AssetClass::Logo, file).await?;
        let label = format!("{business_name} logo");
        let key = self.store_prepared(business_id, &label, &prepared).await?;

        debug!(stage = %OperationStage::Cataloging, key = %key, "Cataloging logo");
        let (asset, displaced) = self
            .catalog_new_primary(business_id, &key, label.clone(), &prepared)
            .await
            .inspect_err(|e| {
                warn!(key = %key, error = %e, "Logo stored but not cataloged; object is orphaned");
            })?;

        debug!(stage = %OperationStage::Reconciling, "Retiring displaced primary");
        let warnings = self.retire_displaced(displaced).await;
        info!(asset_id = %asset.id, key = %key, stage = %OperationStage::Done, "Logo uploaded");
        self.listing(business_id, warnings).await
    }

    /// Upload gallery images in parallel. Each file succeeds or fails on its
    /// own; the report lists both.
    #[instrument(skip(self, business_name, files), fields(files = files.len()))]
    pub async fn upload_gallery(
        &self,
        business_id: Uuid,
        business_name: &str,
        files: Vec<UploadFile>,
    ) -> Result<BatchReport, AssetError> {
        if files.is_empty() {
            return Err(AssetError::InvalidRequest(
                "at least one file is required".into(),
            ));
        }
        if files.len() > self.media.max_batch_files {
            return Err(AssetError::InvalidRequest(format!(
                "at most {} files can be uploaded at once, got {}",
                self.media.max_batch_files,
                files.len()
            )));
        }

        let base_order = AssetCatalog::new(&self.db)
            .max_sort_order(business_id)
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        let label = format!("{business_name} gallery");
        let label = label.as_str();

        let results = join_all(files.into_iter().enumerate().map(move |(position, file)| {
            let file_name = file.file_name.clone();
            let sort_order = base_order + position as i32 + 1;
            async move {
                let result = self
                    .upload_gallery_item(business_id, label, file, sort_order)
                    .await;
                (file_name, result)
            }
        }))
        .await;

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (file_name, result) in results {
            match result {
                Ok(asset) => succeeded.push(asset.id),
                Err(e) => {
                    warn!(file = %file_name, stage = %e.stage(), error = %e, "Gallery item failed");
                    failures.push(ItemFailure::new(file_name, &e));
                }
            }
        }

        info!(
            succeeded = succeeded.len(),
            failed = failures.len(),
            "Gallery upload finished"
        );

        Ok(BatchReport {
            listing: self.listing(business_id, Vec::new()).await?,
            succeeded,
            failures,
        })
    }

    async fn upload_gallery_item(
        &self,
        business_id: Uuid,
        label: &str,
        file: UploadFile,
        sort_order: i32,
    ) -> Result<business_asset::Model, AssetError> {
        let prepared = self.prepare(AssetClass::Gallery, file).await?;
        let key = self.store_prepared(business_id, label, &prepared).await?;

        AssetCatalog::new(&self.db)
            .insert(new_asset(
                business_id,
                &key,
                self.store.public_url(&key),
                label.to_string(),
                sort_order,
                &prepared,
            ))
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Gallery image stored but not cataloged; object is orphaned");
                AssetError::catalog(OperationStage::Cataloging)(e)
            })
    }

    /// Make an existing gallery image the primary image. The previous primary
    /// is removed after the swap commits.
    #[instrument(skip(self))]
    pub async fn promote_to_primary(&self, asset_id: Uuid) -> Result<AssetListing, AssetError> {
        let asset = self.require(asset_id).await?;
        if asset.is_primary {
            debug!("Asset is already primary");
            return self.list_assets(asset.business_id).await;
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        let displaced = swap_in(&AssetCatalog::new(&txn), asset.business_id, asset.id).await?;
        txn.commit()
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;

        let warnings = self.retire_displaced(displaced).await;
        info!(business_id = %asset.business_id, stage = %OperationStage::Done, "Asset promoted to primary");
        self.listing(asset.business_id, warnings).await
    }

    /// Remove one asset: bytes first, then the catalog row.
    #[instrument(skip(self))]
    pub async fn delete_asset(&self, asset_id: Uuid) -> Result<AssetListing, AssetError> {
        let asset = self.require(asset_id).await?;
        self.remove(&asset, OperationStage::Storing).await?;
        info!(business_id = %asset.business_id, key = %asset.object_key, "Asset deleted");
        self.list_assets(asset.business_id).await
    }

    /// Delete several gallery assets of one business, one at a time.
    ///
    /// The primary image is never deleted this way. Unknown ids are reported
    /// per item.
    #[instrument(skip(self, asset_ids), fields(count = asset_ids.len()))]
    pub async fn bulk_delete_assets(&self, asset_ids: &[Uuid]) -> Result<BatchReport, AssetError> {
        if asset_ids.is_empty() {
            return Err(AssetError::InvalidRequest(
                "at least one asset id is required".into(),
            ));
        }
        if asset_ids.len() > MAX_BULK_DELETE {
            return Err(AssetError::InvalidRequest(format!(
                "at most {MAX_BULK_DELETE} assets can be deleted at once"
            )));
        }
        let mut seen = HashSet::with_capacity(asset_ids.len());
        if let Some(duplicate) = asset_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AssetError::InvalidRequest(format!(
                "asset id {duplicate} is listed more than once"
            )));
        }

        let found = AssetCatalog::new(&self.db)
            .find_many(asset_ids)
            .await
            .map_err(AssetError::catalog(OperationStage::Validating))?;
        let businesses: HashSet<Uuid> = found.values().map(|a| a.business_id).collect();
        if businesses.len() > 1 {
            return Err(AssetError::InvalidRequest(
                "all assets must belong to the same business".into(),
            ));
        }
        let Some(business_id) = businesses.into_iter().next() else {
            return Err(AssetError::NotFound("none of the assets exist".into()));
        };

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for id in asset_ids {
            let outcome = match found.get(id) {
                None => Err(AssetError::NotFound(format!("asset {id} not found"))),
                Some(asset) if asset.is_primary => Err(AssetError::InvalidRequest(
                    "the primary image cannot be bulk-deleted; promote another image or delete it individually".into(),
                )),
                Some(asset) => self.remove(asset, OperationStage::Storing).await,
            };
            match outcome {
                Ok(()) => succeeded.push(*id),
                Err(e) => {
                    warn!(asset_id = %id, stage = %e.stage(), error = %e, "Bulk delete item failed");
                    failures.push(ItemFailure::new(id.to_string(), &e));
                }
            }
        }

        info!(
            %business_id,
            deleted = succeeded.len(),
            failed = failures.len(),
            "Bulk delete finished"
        );

        Ok(BatchReport {
            listing: self.listing(business_id, Vec::new()).await?,
            succeeded,
            failures,
        })
    }

    /// Replace an asset's alt text. Surrounding whitespace is trimmed.
    #[instrument(skip(self, alt_text))]
    pub async fn update_alt_text(
        &self,
        asset_id: Uuid,
        alt_text: &str,
    ) -> Result<AssetListing, AssetError> {
        let alt_text = alt_text.trim();
        let length = alt_text.chars().count();
        if length > self.media.max_alt_text_chars {
            return Err(AssetError::InvalidRequest(format!(
                "alt text is {length} characters, the limit is {}",
                self.media.max_alt_text_chars
            )));
        }

        let asset = self.require(asset_id).await?;
        let updated = AssetCatalog::new(&self.db)
            .update_alt_text(asset_id, alt_text)
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        if !updated {
            return Err(AssetError::NotFound(format!("asset {asset_id} not found")));
        }

        self.list_assets(asset.business_id).await
    }

    /// Delete unreferenced stored objects older than `grace_period`,
    /// optionally for one business only.
    #[instrument(skip(self))]
    pub async fn sweep_orphans(
        &self,
        business_id: Option<Uuid>,
        grace_period: Duration,
    ) -> Result<SweepReport, AssetError> {
        let report = sweep_orphans(&self.db, self.store.as_ref(), business_id, grace_period).await?;
        info!(
            scanned = report.scanned,
            orphaned = report.orphaned,
            deleted = report.deleted,
            failed = report.failed,
            "Orphan sweep finished"
        );
        Ok(report)
    }

    async fn require(&self, asset_id: Uuid) -> Result<business_asset::Model, AssetError> {
        AssetCatalog::new(&self.db)
            .find(asset_id)
            .await
            .map_err(AssetError::catalog(OperationStage::Validating))?
            .ok_or_else(|| AssetError::NotFound(format!("asset {asset_id} not found")))
    }

    async fn listing(
        &self,
        business_id: Uuid,
        warnings: Vec<String>,
    ) -> Result<AssetListing, AssetError> {
        let rows = AssetCatalog::new(&self.db)
            .list_for_business(business_id)
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        Ok(AssetListing::from_rows(business_id, rows, warnings))
    }

    /// Validate, then compress off the async runtime.
    async fn prepare(&self, class: AssetClass, file: UploadFile) -> Result<PreparedImage, AssetError> {
        let policy = self.media.policy(class).clone();
        debug!(stage = %OperationStage::Validating, %class, file = %file.file_name, "Validating upload");
        let kind = validate_upload(
            &UploadCandidate {
                file_name: &file.file_name,
                content_type: &file.content_type,
                size: file.bytes.len() as u64,
            },
            policy.max_upload_bytes,
        )
        .map_err(AssetError::ValidationRejected)?;

        let UploadFile {
            file_name, bytes, ..
        } = file;

        let outcome = if bytes.len() as u64 <= policy.compress_threshold_bytes {
            CompressionOutcome::Skipped { bytes }
        } else {
            let fallback = bytes.clone();
            tokio::task::spawn_blocking(move || maybe_compress(bytes, kind, &policy))
                .await
                .unwrap_or_else(|e| {
                    warn!(file = %file_name, error = %e, "Compression task aborted, keeping original");
                    CompressionOutcome::Failed {
                        bytes: fallback,
                        reason: e.to_string(),
                    }
                })
        };

        debug!(file = %file_name, %kind, compression = outcome.label(), size = outcome.bytes().len(), "Prepared image");
        let dimensions = outcome
            .dimensions()
            .or_else(|| read_dimensions(outcome.bytes(), kind));

        Ok(PreparedImage {
            file_name,
            kind,
            bytes: outcome.into_bytes(),
            dimensions,
        })
    }

    async fn store_prepared(
        &self,
        business_id: Uuid,
        label: &str,
        prepared: &PreparedImage,
    ) -> Result<ObjectRef, AssetError> {
        debug!(stage = %OperationStage::Storing, file = %prepared.file_name, size = prepared.bytes.len(), "Storing image");
        self.store
            .put(business_id, label, &prepared.bytes, prepared.kind)
            .await
            .map_err(AssetError::storage(OperationStage::Storing))
    }

    /// Insert the new row and swap it in as primary in one transaction.
    /// Returns the new row and the row it displaced.
    async fn catalog_new_primary(
        &self,
        business_id: Uuid,
        key: &ObjectRef,
        alt_text: String,
        prepared: &PreparedImage,
    ) -> Result<(business_asset::Model, Option<business_asset::Model>), AssetError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        let catalog = AssetCatalog::new(&txn);

        let asset = catalog
            .insert(new_asset(
                business_id,
                key,
                self.store.public_url(key),
                alt_text,
                0,
                prepared,
            ))
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        let displaced = swap_in(&catalog, business_id, asset.id).await?;

        txn.commit()
            .await
            .map_err(AssetError::catalog(OperationStage::Cataloging))?;
        Ok((asset, displaced))
    }

    /// Remove a displaced primary. Failures become warnings: the swap has
    /// already committed and the new primary is authoritative.
    async fn retire_displaced(&self, displaced: Option<business_asset::Model>) -> Vec<String> {
        let Some(previous) = displaced else {
            return Vec::new();
        };
        match self.remove(&previous, OperationStage::Reconciling).await {
            Ok(()) => {
                debug!(asset_id = %previous.id, "Retired previous primary");
                Vec::new()
            }
            Err(e) => {
                warn!(asset_id = %previous.id, key = %previous.object_key, error = %e, "Failed to retire previous primary");
                vec![format!(
                    "previous primary image {} could not be removed: {e}",
                    previous.id
                )]
            }
        }
    }

    /// Delete stored bytes, then the catalog row. A storage failure leaves
    /// the row in place so the catalog never points at missing bytes.
    async fn remove(
        &self,
        asset: &business_asset::Model,
        stage: OperationStage,
    ) -> Result<(), AssetError> {
        let key = ObjectRef::parse(&asset.object_key).map_err(AssetError::storage(stage))?;
        let existed = self
            .store
            .delete(&key)
            .await
            .map_err(AssetError::storage(stage))?;
        if !existed {
            debug!(key = %key, "Object already absent from store");
        }

        let stage = if stage == OperationStage::Storing {
            OperationStage::Cataloging
        } else {
            stage
        };
        let txn = self.db.begin().await.map_err(AssetError::catalog(stage))?;
        AssetCatalog::new(&txn)
            .delete(asset)
            .await
            .map_err(AssetError::catalog(stage))?;
        txn.commit().await.map_err(AssetError::catalog(stage))
    }
}

/// Read the current primary and compare-and-swap `incoming` in. Must run in
/// a transaction; dropping it on error rolls the swap back.
async fn swap_in<C: sea_orm::ConnectionTrait>(
    catalog: &AssetCatalog<'_, C>,
    business_id: Uuid,
    incoming: Uuid,
) -> Result<Option<business_asset::Model>, AssetError> {
    let stage = OperationStage::Cataloging;
    let expected = catalog
        .primary_pointer(business_id)
        .await
        .map_err(AssetError::catalog(stage))?;
    let displaced = catalog
        .find_primary(business_id)
        .await
        .map_err(AssetError::catalog(stage))?
        .filter(|previous| previous.id != incoming);

    match catalog
        .swap_primary(business_id, expected, incoming)
        .await
        .map_err(AssetError::catalog(stage))?
    {
        SwapOutcome::Swapped => Ok(displaced),
        SwapOutcome::Lost => Err(AssetError::Conflict(
            "the primary image was changed by another request; reload and try again".into(),
        )),
    }
}

fn new_asset(
    business_id: Uuid,
    key: &ObjectRef,
    url: String,
    alt_text: String,
    sort_order: i32,
    prepared: &PreparedImage,
) -> NewAsset {
    NewAsset {
        business_id,
        object_key: key.to_string(),
        url,
        alt_text,
        sort_order,
        content_type: prepared.kind.mime().to_string(),
        size: prepared.bytes.len() as i64,
        width: prepared.dimensions.map(|(w, _)| w as i32),
        height: prepared.dimensions.map(|(_, h)| h as i32),
        original_filename: prepared.file_name.clone(),
    }
}
