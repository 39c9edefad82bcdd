use chrono::Utc;
use tracing::{error, info, warn};

use crate::codec::{decode_data_url_to_file, encode_file_to_data_url, CodecError, ImageFile};
use crate::history::{next_record_id, HistoryRecord, HistoryStore};
use crate::llm::{GenerationError, ImageGenerator};

pub const MISSING_IMAGE_MESSAGE: &str = "Veuillez d'abord télécharger une image.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Désolé, une erreur s'est produite lors de la création de votre photo. Veuillez réessayer.";
pub const EDIT_FAILED_MESSAGE: &str = "Cette photo ne peut plus être modifiée.";
pub const EDIT_FILE_NAME: &str = "editing-face.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ready,
    Generating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file: ImageFile,
    pub preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub image: Option<UploadedImage>,
    pub age: String,
    pub outfit: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("no image has been uploaded")]
    MissingImage,
    #[error("a generation is already in progress")]
    Busy,
    #[error("no pending generation to complete")]
    NotGenerating,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Snapshot of the form taken when a generation starts.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub image: UploadedImage,
    pub age: String,
    pub outfit: String,
}

pub struct AppController<G: ImageGenerator> {
    generator: G,
    store: HistoryStore,
    history: Vec<HistoryRecord>,
    form: FormState,
    phase: Phase,
    error: Option<String>,
    last_failure: Option<GenerationError>,
    viewing: Option<String>,
}

impl<G: ImageGenerator> AppController<G> {
    pub fn new(generator: G, store: HistoryStore) -> Self {
        let history = store.load();
        Self {
            generator,
            store,
            history,
            form: FormState::default(),
            phase: Phase::Idle,
            error: None,
            last_failure: None,
            viewing: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Generating
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn find_record(&self, id: i64) -> Option<&HistoryRecord> {
        self.history.iter().find(|record| record.id == id)
    }

    /// Message meant for the user. Never names the underlying cause.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_failure(&self) -> Option<&GenerationError> {
        self.last_failure.as_ref()
    }

    pub fn viewing(&self) -> Option<&str> {
        self.viewing.as_deref()
    }

    fn ensure_not_generating(&self) -> Result<(), ControllerError> {
        if self.phase == Phase::Generating {
            return Err(ControllerError::Busy);
        }
        Ok(())
    }

    pub fn upload(&mut self, file: ImageFile) -> Result<(), ControllerError> {
        self.ensure_not_generating()?;
        let preview = encode_file_to_data_url(&file);
        self.form.image = Some(UploadedImage { file, preview });
        self.error = None;
        self.last_failure = None;
        self.phase = Phase::Ready;
        Ok(())
    }

    pub fn set_age(&mut self, value: impl Into<String>) -> Result<(), ControllerError> {
        self.ensure_not_generating()?;
        self.form.age = value.into();
        Ok(())
    }

    pub fn set_outfit(&mut self, value: impl Into<String>) -> Result<(), ControllerError> {
        self.ensure_not_generating()?;
        self.form.outfit = value.into();
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), ControllerError> {
        self.ensure_not_generating()?;
        self.clear_form();
        Ok(())
    }

    fn clear_form(&mut self) {
        self.form = FormState::default();
        self.error = None;
        self.last_failure = None;
        self.phase = Phase::Idle;
    }

    /// Moves to `Generating` and hands back what must be sent. Only one
    /// generation may be pending at a time.
    pub fn begin_generation(&mut self) -> Result<PendingGeneration, ControllerError> {
        self.ensure_not_generating()?;
        let Some(image) = self.form.image.clone() else {
            self.error = Some(MISSING_IMAGE_MESSAGE.to_string());
            return Err(ControllerError::MissingImage);
        };

        self.phase = Phase::Generating;
        self.error = None;
        self.last_failure = None;
        Ok(PendingGeneration {
            image,
            age: self.form.age.clone(),
            outfit: self.form.outfit.clone(),
        })
    }

    pub fn complete_generation(
        &mut self,
        pending: PendingGeneration,
        result: Result<String, GenerationError>,
    ) -> Result<HistoryRecord, ControllerError> {
        if self.phase != Phase::Generating {
            return Err(ControllerError::NotGenerating);
        }

        match result {
            Ok(image_base64) => {
                let record = HistoryRecord {
                    id: next_record_id(Utc::now().timestamp_millis(), &self.history),
                    generated_image: format!("data:image/jpeg;base64,{image_base64}"),
                    original_image: pending.image.preview,
                    age: pending.age,
                    outfit: pending.outfit,
                };
                info!(
                    "Generation succeeded; stored record {} ({} in history)",
                    record.id,
                    self.history.len() + 1
                );
                self.history.insert(0, record.clone());
                self.store.save(&self.history);
                self.clear_form();
                Ok(record)
            }
            Err(err) => {
                if err.is_fatal() {
                    error!("Generation cannot run: {}", err);
                } else {
                    warn!("Generation failed: {}", err);
                }
                self.phase = Phase::Ready;
                self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
                self.last_failure = Some(err.clone());
                Err(ControllerError::Generation(err))
            }
        }
    }

    pub async fn submit(&mut self) -> Result<HistoryRecord, ControllerError> {
        let pending = self.begin_generation()?;
        let result = self
            .generator
            .generate(&pending.image.file, &pending.age, &pending.outfit)
            .await;
        self.complete_generation(pending, result)
    }

    /// Removes the record with `id`. Unknown ids leave history untouched.
    pub fn delete_record(&mut self, id: i64) -> bool {
        let Some(index) = self.history.iter().position(|record| record.id == id) else {
            return false;
        };
        self.history.remove(index);
        self.store.save(&self.history);
        info!("Deleted history record {}", id);
        true
    }

    /// Refills the form from a stored record. The record itself stays in history.
    pub fn edit_record(&mut self, record: &HistoryRecord) -> Result<(), ControllerError> {
        self.ensure_not_generating()?;
        let file = match decode_data_url_to_file(&record.original_image, EDIT_FILE_NAME) {
            Ok(file) => file,
            Err(err) => {
                warn!("Cannot edit record {}: {}", record.id, err);
                self.error = Some(EDIT_FAILED_MESSAGE.to_string());
                return Err(err.into());
            }
        };

        self.form = FormState {
            image: Some(UploadedImage {
                file,
                preview: record.original_image.clone(),
            }),
            age: record.age.clone(),
            outfit: record.outfit.clone(),
        };
        self.error = None;
        self.last_failure = None;
        self.phase = Phase::Ready;
        Ok(())
    }

    pub fn view_record(&mut self, image_url: impl Into<String>) {
        self.viewing = Some(image_url.into());
    }

    pub fn close_view(&mut self) {
        self.viewing = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryKeyValueStore;
    use crate::llm::mock::MockGenerator;

    const KEY: &str = "birthdayShootHistory";
    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    fn upload_file() -> ImageFile {
        ImageFile::new("face.png", "image/png", PNG_BYTES.to_vec())
    }

    fn controller(generator: MockGenerator) -> AppController<MockGenerator> {
        AppController::new(
            generator,
            HistoryStore::new(Box::new(MemoryKeyValueStore::new()), KEY),
        )
    }

    fn stored_record(id: i64, original_image: &str) -> HistoryRecord {
        HistoryRecord {
            id,
            generated_image: "data:image/jpeg;base64,R0VO".to_string(),
            original_image: original_image.to_string(),
            age: "7".to_string(),
            outfit: "Chic & Élégant".to_string(),
        }
    }

    #[test]
    fn starts_idle_with_loaded_history() {
        let records = vec![
            stored_record(2, "data:image/png;base64,AA=="),
            stored_record(1, "data:image/png;base64,AA=="),
        ];
        let backend =
            MemoryKeyValueStore::with_slot(KEY, &serde_json::to_string(&records).expect("json"));
        let app = AppController::new(
            MockGenerator::succeeding(),
            HistoryStore::new(Box::new(backend), KEY),
        );
        assert_eq!(app.phase(), Phase::Idle);
        assert_eq!(app.history(), records.as_slice());
    }

    #[tokio::test]
    async fn successful_generation_prepends_record_and_resets_form() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        assert_eq!(app.phase(), Phase::Ready);

        let record = app.submit().await.expect("generation succeeds");

        assert_eq!(app.phase(), Phase::Idle);
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history()[0], record);
        assert_eq!(record.generated_image, "data:image/jpeg;base64,R0VORVJBVEVE");
        assert_eq!(record.original_image, encode_file_to_data_url(&upload_file()));
        assert_eq!(record.age, "");
        assert_eq!(record.outfit, "");
        assert_eq!(app.form(), &FormState::default());
        assert!(app.error_message().is_none());
        assert_eq!(app.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn successful_generation_is_persisted() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        app.set_age("30").expect("age");
        let record = app.submit().await.expect("generation succeeds");

        assert_eq!(app.store.load(), vec![record]);
    }

    #[tokio::test]
    async fn failed_generation_keeps_fields_and_history() {
        let mut app = controller(MockGenerator::failing(GenerationError::Failed(
            "status 500".to_string(),
        )));
        app.upload(upload_file()).expect("upload");
        app.set_age("12").expect("age");
        app.set_outfit("Festif & Pailleté").expect("outfit");

        let err = app.submit().await.unwrap_err();

        assert!(matches!(err, ControllerError::Generation(GenerationError::Failed(_))));
        assert_eq!(app.phase(), Phase::Ready);
        assert!(!app.is_loading());
        assert_eq!(app.form().age, "12");
        assert_eq!(app.form().outfit, "Festif & Pailleté");
        assert!(app.form().image.is_some());
        assert!(app.history().is_empty());
        assert_eq!(app.error_message(), Some(GENERATION_FAILED_MESSAGE));
        assert!(matches!(app.last_failure(), Some(GenerationError::Failed(_))));
    }

    #[tokio::test]
    async fn every_failure_kind_shows_the_same_message() {
        for err in [
            GenerationError::Configuration,
            GenerationError::NoImageReturned("text only".to_string()),
            GenerationError::Failed("timeout".to_string()),
        ] {
            let mut app = controller(MockGenerator::failing(err.clone()));
            app.upload(upload_file()).expect("upload");
            assert!(app.submit().await.is_err());
            assert_eq!(app.error_message(), Some(GENERATION_FAILED_MESSAGE));
            assert_eq!(app.last_failure(), Some(&err));
        }
    }

    #[tokio::test]
    async fn submit_without_image_sets_error_and_never_calls_generator() {
        let mut app = controller(MockGenerator::succeeding());
        app.set_age("5").expect("age");

        let err = app.submit().await.unwrap_err();

        assert!(matches!(err, ControllerError::MissingImage));
        assert_eq!(app.error_message(), Some(MISSING_IMAGE_MESSAGE));
        assert_eq!(app.phase(), Phase::Idle);
        assert_eq!(app.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn user_messages_are_in_french() {
        let mut app = controller(MockGenerator::failing(GenerationError::Configuration));
        assert!(app.submit().await.is_err());
        assert_eq!(
            app.error_message(),
            Some("Veuillez d'abord télécharger une image.")
        );

        app.upload(upload_file()).expect("upload");
        assert!(app.submit().await.is_err());
        assert_eq!(
            app.error_message(),
            Some("Désolé, une erreur s'est produite lors de la création de votre photo. Veuillez réessayer.")
        );
    }

    #[test]
    fn second_generation_is_rejected_while_one_is_pending() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");

        let pending = app.begin_generation().expect("first generation starts");
        assert!(app.is_loading());
        assert!(matches!(app.begin_generation(), Err(ControllerError::Busy)));
        assert!(matches!(app.upload(upload_file()), Err(ControllerError::Busy)));
        assert!(matches!(app.reset(), Err(ControllerError::Busy)));
        assert!(matches!(app.set_outfit("x"), Err(ControllerError::Busy)));

        app.complete_generation(pending, Ok("QUJD".to_string()))
            .expect("completes");
        assert_eq!(app.phase(), Phase::Idle);
    }

    #[test]
    fn completing_without_pending_generation_is_rejected() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        let pending = app.begin_generation().expect("starts");
        app.complete_generation(pending.clone(), Ok("QUJD".to_string()))
            .expect("completes");

        assert!(matches!(
            app.complete_generation(pending, Ok("QUJD".to_string())),
            Err(ControllerError::NotGenerating)
        ));
        assert_eq!(app.history().len(), 1);
    }

    #[tokio::test]
    async fn records_get_distinct_ids_newest_first() {
        let mut app = controller(MockGenerator::succeeding());
        for _ in 0..3 {
            app.upload(upload_file()).expect("upload");
            app.submit().await.expect("generation succeeds");
        }
        let ids: Vec<i64> = app.history().iter().map(|record| record.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|pair| pair[0] > pair[1]), "ids {ids:?}");
    }

    #[test]
    fn reset_discards_form() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        app.set_age("3").expect("age");
        app.reset().expect("reset");
        assert_eq!(app.phase(), Phase::Idle);
        assert_eq!(app.form(), &FormState::default());
    }

    #[tokio::test]
    async fn delete_removes_exactly_one_matching_record() {
        let mut app = controller(MockGenerator::succeeding());
        for _ in 0..2 {
            app.upload(upload_file()).expect("upload");
            app.submit().await.expect("generation succeeds");
        }
        let target = app.history()[1].id;
        let keep = app.history()[0].id;

        assert!(app.delete_record(target));
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history()[0].id, keep);
        assert_eq!(app.store.load().len(), 1);
    }

    #[tokio::test]
    async fn delete_with_unknown_id_is_a_noop() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        app.submit().await.expect("generation succeeds");
        let before = app.history().to_vec();

        assert!(!app.delete_record(-42));
        assert_eq!(app.history(), before.as_slice());
    }

    #[tokio::test]
    async fn edit_restores_form_from_record() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        app.set_age("7").expect("age");
        app.set_outfit("Chic & Élégant").expect("outfit");
        let record = app.submit().await.expect("generation succeeds");

        app.edit_record(&record).expect("edit");

        assert_eq!(app.phase(), Phase::Ready);
        assert_eq!(app.form().age, "7");
        assert_eq!(app.form().outfit, "Chic & Élégant");
        let image = app.form().image.as_ref().expect("image restored");
        assert_eq!(image.file.len(), PNG_BYTES.len());
        assert_eq!(image.file.name, EDIT_FILE_NAME);
        assert_eq!(image.file.mime_type, "image/png");
        assert_eq!(app.history().len(), 1);
    }

    #[tokio::test]
    async fn submitting_an_edit_creates_a_new_record() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        let original = app.submit().await.expect("generation succeeds");

        app.edit_record(&original).expect("edit");
        app.set_outfit("Costume de super-héros").expect("outfit");
        let edited = app.submit().await.expect("generation succeeds");

        assert_ne!(edited.id, original.id);
        assert_eq!(app.history().len(), 2);
        assert_eq!(app.history()[0], edited);
        assert_eq!(app.history()[1], original);
        let calls = app.generator.calls.lock().expect("calls lock");
        assert_eq!(calls[1].1, "Costume de super-héros");
    }

    #[test]
    fn malformed_record_image_leaves_form_untouched() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");
        app.set_age("9").expect("age");
        let before = app.form().clone();

        let err = app
            .edit_record(&stored_record(1, "not-a-data-url"))
            .unwrap_err();

        assert!(matches!(err, ControllerError::Codec(CodecError::MalformedInput(_))));
        assert_eq!(app.form(), &before);
        assert_eq!(app.error_message(), Some(EDIT_FAILED_MESSAGE));
    }

    #[test]
    fn viewer_toggles_without_touching_state() {
        let mut app = controller(MockGenerator::succeeding());
        app.upload(upload_file()).expect("upload");

        app.view_record("data:image/jpeg;base64,R0VO");
        assert_eq!(app.viewing(), Some("data:image/jpeg;base64,R0VO"));
        assert_eq!(app.phase(), Phase::Ready);

        app.close_view();
        assert_eq!(app.viewing(), None);
        assert_eq!(app.phase(), Phase::Ready);
    }
}
