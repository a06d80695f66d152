//! Product authoring sessions.
//!
//! A session owns the form values and the staged images of one create or
//! edit flow for one seller. Nothing is written to storage until
//! [`AuthoringSession::submit`]; dropping a session abandons it.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{LocalFile, ProductRecord, SellerContext, StagedImage};
use crate::repositories::{ProductRepository, SaveReport};
use crate::staging::ImageStaging;
use crate::validation::{validate_product, ProductForm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// The record does not exist yet; its id is reserved for the session.
    Create { record_id: String },
    Edit { record_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Submitted,
    SubmitFailed,
}

/// What a submit attempt led to.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Saved; the session now edits the saved record. Removed images whose
    /// blobs could not be deleted are listed in the report.
    Submitted(SaveReport),
    /// Input the seller has to fix; nothing was written.
    Rejected(ServiceError),
    /// A storage step failed; the session stays editable for a resubmit.
    Failed(ServiceError),
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_))
    }

    /// Storage paths left behind by the save, if it succeeded.
    pub fn failed_deletes(&self) -> &[String] {
        match self {
            SubmitOutcome::Submitted(report) => &report.failed_deletes,
            _ => &[],
        }
    }

    pub fn into_result(self) -> Result<SaveReport, ServiceError> {
        match self {
            SubmitOutcome::Submitted(report) => Ok(report),
            SubmitOutcome::Rejected(err) | SubmitOutcome::Failed(err) => Err(err),
        }
    }
}

pub struct AuthoringSession {
    repo: Arc<dyn ProductRepository>,
    seller: SellerContext,
    mode: SessionMode,
    form: ProductForm,
    staging: ImageStaging,
    state: SessionState,
}

impl std::fmt::Debug for AuthoringSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoringSession")
            .field("seller", &self.seller)
            .field("mode", &self.mode)
            .field("form", &self.form)
            .field("staging", &self.staging)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl AuthoringSession {
    /// Empty form and no images.
    pub fn create(repo: Arc<dyn ProductRepository>, seller: SellerContext) -> Self {
        Self {
            repo,
            seller,
            mode: SessionMode::Create {
                record_id: Uuid::new_v4().to_string(),
            },
            form: ProductForm::default(),
            staging: ImageStaging::new(),
            state: SessionState::Editing,
        }
    }

    /// Form and images pre-populated from the stored record.
    #[instrument(skip(repo), fields(seller_id = %seller.seller_id))]
    pub async fn edit(
        repo: Arc<dyn ProductRepository>,
        seller: SellerContext,
        id: &str,
    ) -> Result<Self, ServiceError> {
        let record = repo.read(id).await?;
        if record.seller_id != seller.seller_id {
            return Err(ServiceError::Forbidden(format!(
                "product {id} belongs to another seller"
            )));
        }

        Ok(Self {
            repo,
            seller,
            mode: SessionMode::Edit {
                record_id: record.id.clone(),
            },
            form: ProductForm::from(record.draft()),
            staging: ImageStaging::from_record(&record),
            state: SessionState::Editing,
        })
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn record_id(&self) -> &str {
        match &self.mode {
            SessionMode::Create { record_id } | SessionMode::Edit { record_id } => record_id,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn form(&self) -> &ProductForm {
        &self.form
    }

    pub fn images(&self) -> &[StagedImage] {
        self.staging.entries()
    }

    pub fn previews(&self) -> Vec<&str> {
        self.staging.previews()
    }

    pub fn add_files<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = LocalFile>,
    {
        self.staging.add_files(files);
    }

    pub fn remove_image(&mut self, index: usize) -> Result<StagedImage, ServiceError> {
        Ok(self.staging.remove_at(index)?)
    }

    /// Validates `form` and saves it together with the staged images.
    #[instrument(skip(self, form), fields(record_id = %self.record_id(), seller_id = %self.seller.seller_id))]
    pub async fn submit(&mut self, form: ProductForm) -> SubmitOutcome {
        self.form = form;

        let draft = match validate_product(&self.form) {
            Ok(draft) => draft,
            Err(violations) => return self.reject(ServiceError::ValidationFailure(violations)),
        };
        if matches!(self.mode, SessionMode::Edit { .. }) && self.staging.is_empty() {
            return self.reject(ServiceError::NoImageSelected);
        }

        let files = self.staging.to_upload_set();
        let saved = match &self.mode {
            SessionMode::Create { record_id } => {
                let record = ProductRecord::new(record_id.clone(), &self.seller.seller_id, draft);
                self.repo
                    .create(record, files)
                    .await
                    .map(|record| SaveReport {
                        record,
                        failed_deletes: Vec::new(),
                    })
            }
            SessionMode::Edit { record_id } => self
                .repo
                .update(
                    &self.seller,
                    record_id,
                    draft,
                    files,
                    self.staging.to_delete_set(),
                )
                .await,
        };

        match saved {
            Ok(report) => {
                if !report.failed_deletes.is_empty() {
                    warn!(paths = ?report.failed_deletes, "Saved with undeleted image blobs");
                }
                info!(images = report.record.images.len(), "Product submitted");
                self.staging.promote(&report.record);
                self.mode = SessionMode::Edit {
                    record_id: report.record.id.clone(),
                };
                self.state = SessionState::Submitted;
                SubmitOutcome::Submitted(report)
            }
            Err(err) if err.is_recoverable() => self.reject(err),
            Err(err) => {
                warn!("Product submit failed: {}", err);
                self.state = SessionState::SubmitFailed;
                SubmitOutcome::Failed(err)
            }
        }
    }

    fn reject(&mut self, err: ServiceError) -> SubmitOutcome {
        self.state = SessionState::Editing;
        SubmitOutcome::Rejected(err)
    }
}
