use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::MediaConfig;
use common::media::{UploadCandidate, validate_upload};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::assets::{AssetError, BatchReport, ItemFailure, UploadFile};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::asset::{
    AssetListResponse, BatchResponse, BulkDeleteRequest, UpdateAltTextRequest,
};
use crate::state::AppState;
use crate::utils::filename::clean_upload_filename;

/// Room for multipart boundaries and text fields on top of file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

const MAX_BUSINESS_NAME_CHARS: usize = 200;

/// Body limit for logo uploads. Generous enough that a file somewhat over
/// the ceiling still reaches validation and gets a structured rejection.
pub fn logo_body_limit(media: &MediaConfig) -> DefaultBodyLimit {
    DefaultBodyLimit::max(2 * media.logo.max_upload_bytes as usize + MULTIPART_OVERHEAD)
}

pub fn gallery_body_limit(media: &MediaConfig) -> DefaultBodyLimit {
    let per_file = media.gallery.max_upload_bytes as usize;
    DefaultBodyLimit::max((media.max_batch_files + 1) * per_file + MULTIPART_OVERHEAD)
}

#[utoipa::path(
    get,
    path = "/businesses/{business_id}/assets",
    tag = "Business Media",
    operation_id = "listAssets",
    summary = "List a business's images",
    description = "Returns the primary image first, then gallery images by sort order.",
    params(("business_id" = Uuid, Path, description = "Business ID")),
    responses(
        (status = 200, description = "Asset list", body = AssetListResponse),
        (status = 503, description = "Catalog unavailable (CATALOG_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(business_id = %business_id))]
pub async fn list_assets(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
) -> Result<AppJson<AssetListResponse>, AppError> {
    let listing = state.assets.list_assets(business_id).await?;
    Ok(AppJson(listing.into()))
}

#[utoipa::path(
    post,
    path = "/businesses/{business_id}/logo",
    tag = "Business Media",
    operation_id = "uploadLogo",
    summary = "Upload a new primary image",
    description = "Multipart fields: `file` (required) and `business_name` (required, used to \
        label the stored object and default alt text). The new image replaces the current \
        primary image, which is then deleted. If that deletion fails the upload still \
        succeeds and the response carries a warning.",
    params(("business_id" = Uuid, Path, description = "Business ID")),
    request_body(content_type = "multipart/form-data", description = "Logo file and business name"),
    responses(
        (status = 201, description = "Logo stored and set as primary", body = AssetListResponse),
        (status = 400, description = "Malformed request (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Primary image changed concurrently (CONFLICT)", body = ErrorBody),
        (status = 422, description = "Unsupported type or too large (VALIDATION_REJECTED)", body = ErrorBody),
        (status = 502, description = "Object store failure (STORAGE_FAILURE)", body = ErrorBody),
        (status = 503, description = "Catalog failure (CATALOG_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart), fields(business_id = %business_id))]
pub async fn upload_logo(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let limits = PartLimits {
        max_files: 1,
        max_file_bytes: state.assets.media().logo.max_upload_bytes,
    };
    let form = read_upload_form(multipart, "file", limits).await?;
    if let Some((_, err)) = form.rejected.into_iter().next() {
        return Err(err.into());
    }
    let Some(file) = form.files.into_iter().next() else {
        return Err(AppError::Validation("Missing 'file' field".into()));
    };

    let listing = state
        .assets
        .upload_logo(business_id, &form.business_name, file)
        .await?;
    Ok((StatusCode::CREATED, AppJson(AssetListResponse::from(listing))))
}

#[utoipa::path(
    post,
    path = "/businesses/{business_id}/gallery",
    tag = "Business Media",
    operation_id = "uploadGallery",
    summary = "Upload gallery images",
    description = "Multipart fields: one or more `files` and `business_name`. Files are \
        processed independently and appended after the current last gallery position. \
        Answers 207 with per-file failures when some files could not be added. A part with a \
        missing or unusable filename, or one over the size ceiling, fails on its own.",
    params(("business_id" = Uuid, Path, description = "Business ID")),
    request_body(content_type = "multipart/form-data", description = "Gallery files and business name"),
    responses(
        (status = 200, description = "All files added", body = BatchResponse),
        (status = 207, description = "Some files failed (PARTIAL_BATCH_FAILURE)", body = BatchResponse),
        (status = 400, description = "Malformed request or too many files (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Catalog failure (CATALOG_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart), fields(business_id = %business_id))]
pub async fn upload_gallery(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let media = state.assets.media();
    let limits = PartLimits {
        max_files: media.max_batch_files,
        max_file_bytes: media.gallery.max_upload_bytes,
    };
    let form = read_upload_form(multipart, "files", limits).await?;

    let mut report = if form.files.is_empty() {
        BatchReport {
            listing: state.assets.list_assets(business_id).await?,
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    } else {
        state
            .assets
            .upload_gallery(business_id, &form.business_name, form.files)
            .await?
    };

    if !form.rejected.is_empty() {
        let mut failures: Vec<_> = form
            .rejected
            .iter()
            .map(|(item, err)| ItemFailure::new(item.as_str(), err))
            .collect();
        failures.append(&mut report.failures);
        report.failures = failures;
    }
    Ok(batch_response(report))
}

#[utoipa::path(
    post,
    path = "/assets/{asset_id}/promote",
    tag = "Business Media",
    operation_id = "promoteAsset",
    summary = "Make a gallery image the primary image",
    description = "The previous primary image is deleted once the swap has committed. \
        Promoting the current primary image is a no-op.",
    params(("asset_id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset is now primary", body = AssetListResponse),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Primary image changed concurrently (CONFLICT)", body = ErrorBody),
        (status = 503, description = "Catalog failure (CATALOG_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(asset_id = %asset_id))]
pub async fn promote_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> Result<AppJson<AssetListResponse>, AppError> {
    let listing = state.assets.promote_to_primary(asset_id).await?;
    Ok(AppJson(listing.into()))
}

#[utoipa::path(
    patch,
    path = "/assets/{asset_id}",
    tag = "Business Media",
    operation_id = "updateAltText",
    summary = "Edit an image's alt text",
    params(("asset_id" = Uuid, Path, description = "Asset ID")),
    request_body = UpdateAltTextRequest,
    responses(
        (status = 200, description = "Alt text updated", body = AssetListResponse),
        (status = 400, description = "Alt text too long (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(asset_id = %asset_id))]
pub async fn update_alt_text(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateAltTextRequest>,
) -> Result<AppJson<AssetListResponse>, AppError> {
    let listing = state
        .assets
        .update_alt_text(asset_id, &payload.alt_text)
        .await?;
    Ok(AppJson(listing.into()))
}

#[utoipa::path(
    delete,
    path = "/assets/{asset_id}",
    tag = "Business Media",
    operation_id = "deleteAsset",
    summary = "Delete an image",
    description = "Removes the stored bytes, then the catalog entry. Deleting the primary \
        image leaves the business without one.",
    params(("asset_id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset deleted", body = AssetListResponse),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Object store failure, nothing deleted (STORAGE_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(asset_id = %asset_id))]
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> Result<AppJson<AssetListResponse>, AppError> {
    let listing = state.assets.delete_asset(asset_id).await?;
    Ok(AppJson(listing.into()))
}

#[utoipa::path(
    post,
    path = "/assets/bulk-delete",
    tag = "Business Media",
    operation_id = "bulkDeleteAssets",
    summary = "Delete several gallery images",
    description = "All IDs must belong to one business. The primary image and unknown IDs \
        are reported as per-item failures.",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "All assets deleted", body = BatchResponse),
        (status = 207, description = "Some assets were not deleted (PARTIAL_BATCH_FAILURE)", body = BatchResponse),
        (status = 400, description = "Empty, duplicate, oversized or mixed-business ID list (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "None of the assets exist (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.asset_ids.len()))]
pub async fn bulk_delete_assets(
    State(state): State<AppState>,
    AppJson(payload): AppJson<BulkDeleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.assets.bulk_delete_assets(&payload.asset_ids).await?;
    Ok(batch_response(report))
}

fn batch_response(report: BatchReport) -> impl IntoResponse {
    let status = if report.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    (status, AppJson(BatchResponse::from(report)))
}

/// Limits enforced while multipart parts are read.
#[derive(Debug, Clone, Copy)]
struct PartLimits {
    max_files: usize,
    max_file_bytes: u64,
}

/// Parsed upload form.
struct UploadForm {
    business_name: String,
    files: Vec<UploadFile>,
    /// Parts turned away while reading, keyed by the name they are reported under.
    rejected: Vec<(String, AssetError)>,
}

enum PartBody {
    Complete(Vec<u8>),
    /// Total size of a part that went over the ceiling. Its bytes are discarded.
    Oversized(u64),
}

/// Collect file fields named `file_field` plus `business_name`. Unknown
/// fields are ignored.
///
/// A request with more file parts than `limits.max_files` is refused as soon
/// as the extra part shows up. A part with a missing or unusable filename,
/// or one larger than `limits.max_file_bytes`, lands in `rejected` and the
/// remaining parts are still read.
async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
    limits: PartLimits,
) -> Result<UploadForm, AppError> {
    let mut business_name = None;
    let mut files = Vec::new();
    let mut rejected = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "business_name" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read business_name: {e}")))?;
            business_name = Some(text);
            continue;
        }
        if name != file_field && name != format!("{file_field}[]") {
            continue;
        }

        let part_number = files.len() + rejected.len() + 1;
        if part_number > limits.max_files {
            return Err(AppError::Validation(format!(
                "At most {} '{file_field}' parts can be uploaded at once",
                limits.max_files
            )));
        }

        let file_name = match field.file_name() {
            None => Err((
                format!("{name} part {part_number}"),
                format!("'{name}' part {part_number} has no filename"),
            )),
            Some(raw) => clean_upload_filename(raw)
                .map_err(|e| (raw.escape_debug().to_string(), e.to_string())),
        };
        let file_name = match file_name {
            Ok(file_name) => file_name,
            Err((item, reason)) => {
                debug!(%item, %reason, "Skipping upload part");
                rejected.push((item, AssetError::InvalidRequest(reason)));
                continue;
            }
        };
        let content_type = declared_content_type(field.content_type(), &file_name);

        match read_part(field, limits.max_file_bytes, &file_name).await? {
            PartBody::Complete(bytes) => files.push(UploadFile {
                file_name,
                content_type,
                bytes,
            }),
            PartBody::Oversized(size) => {
                let candidate = UploadCandidate {
                    file_name: &file_name,
                    content_type: &content_type,
                    size,
                };
                if let Err(rejection) = validate_upload(&candidate, limits.max_file_bytes) {
                    rejected.push((file_name, AssetError::ValidationRejected(rejection)));
                }
            }
        }
    }

    let business_name = business_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Missing 'business_name' field".into()))?;
    if business_name.chars().count() > MAX_BUSINESS_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "business_name must be at most {MAX_BUSINESS_NAME_CHARS} characters"
        )));
    }
    if files.is_empty() && rejected.is_empty() {
        return Err(AppError::Validation(format!("Missing '{file_field}' field")));
    }

    Ok(UploadForm {
        business_name,
        files,
        rejected,
    })
}

/// Read a part chunk by chunk, keeping at most `ceiling` bytes in memory.
/// An oversized part is drained so its size can be reported.
async fn read_part(mut field: Field<'_>, ceiling: u64, file_name: &str) -> Result<PartBody, AppError> {
    let mut bytes = Vec::new();
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {file_name}: {e}")))?
    {
        size += chunk.len() as u64;
        if size > ceiling {
            bytes = Vec::new();
        } else {
            bytes.extend_from_slice(&chunk);
        }
    }

    Ok(if size > ceiling {
        PartBody::Oversized(size)
    } else {
        PartBody::Complete(bytes)
    })
}

/// Declared part content type, or a guess from the extension when the
/// client sent none or a generic one.
fn declared_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && !ct.eq_ignore_ascii_case("application/octet-stream") => {
            ct.to_string()
        }
        _ => mime_guess::from_path(file_name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default(),
    }
}
