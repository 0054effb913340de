use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::models::{GenerationState, OutfitRecord, RunSnapshot};
use crate::store::{prepare_for_save, RecordStore, SaveClock};
use crate::workflow::Stylist;

struct ActiveRun {
    snapshot: RunSnapshot,
    edits_in_flight: HashSet<String>,
}

/// Active styling runs plus the saved-look store. Every background result is
/// written back by run and outfit id, and dropped if either is gone.
#[derive(Clone)]
pub struct StylingSessions {
    stylist: Stylist,
    store: Arc<dyn RecordStore>,
    runs: Arc<RwLock<HashMap<Uuid, ActiveRun>>>,
    clock: Arc<SaveClock>,
}

impl StylingSessions {
    pub fn new(stylist: Stylist, store: Arc<dyn RecordStore>) -> Self {
        Self {
            stylist,
            store,
            runs: Arc::default(),
            clock: Arc::default(),
        }
    }

    pub fn stylist(&self) -> &Stylist {
        &self.stylist
    }

    /// Returns as soon as the looks are materialized; images land later.
    pub async fn start_run(&self, source_image: &str, custom_occasion: Option<&str>) -> Result<RunSnapshot, SessionError> {
        let run = self.stylist.run_styling(source_image, custom_occasion).await?;
        let now = Utc::now();
        let snapshot = RunSnapshot {
            id: Uuid::new_v4(),
            custom_occasion: custom_occasion.map(str::trim).filter(|o| !o.is_empty()).map(String::from),
            analysis: run.analysis,
            outfits: run.outfits,
            created_at: now,
            updated_at: now,
        };

        self.runs.write().insert(snapshot.id, ActiveRun {
            snapshot: snapshot.clone(),
            edits_in_flight: HashSet::new(),
        });
        info!(run = %snapshot.id, looks = snapshot.outfits.len(), "Styling run started");

        tokio::spawn(self.clone().drain_updates(snapshot.id, run.updates));
        Ok(snapshot)
    }

    async fn drain_updates(self, run_id: Uuid, mut updates: mpsc::UnboundedReceiver<OutfitRecord>) {
        while let Some(update) = updates.recv().await {
            if !self.apply_update(run_id, update) {
                debug!(run = %run_id, "Dropping stale look update");
            }
        }
    }

    /// Writes one resolved record into its run. Returns false when the run
    /// or the record no longer exists.
    fn apply_update(&self, run_id: Uuid, update: OutfitRecord) -> bool {
        let mut runs = self.runs.write();
        let Some(run) = runs.get_mut(&run_id) else { return false };
        let Some(slot) = run.snapshot.outfit_mut(&update.id) else { return false };
        *slot = update;
        run.snapshot.updated_at = Utc::now();
        true
    }

    pub fn run(&self, run_id: Uuid) -> Option<RunSnapshot> {
        self.runs.read().get(&run_id).map(|r| r.snapshot.clone())
    }

    /// Forgets a run; results still in flight for it are ignored on arrival.
    pub fn discard_run(&self, run_id: Uuid) -> bool {
        let removed = self.runs.write().remove(&run_id).is_some();
        if removed {
            info!(run = %run_id, "Styling run discarded");
        }
        removed
    }

    fn outfit(&self, run_id: Uuid, outfit_id: &str) -> Result<OutfitRecord, SessionError> {
        let runs = self.runs.read();
        let run = runs.get(&run_id).ok_or(SessionError::RunNotFound(run_id))?;
        run.snapshot.outfit(outfit_id).cloned().ok_or_else(|| SessionError::OutfitNotFound(outfit_id.to_string()))
    }

    pub async fn edit_outfit(&self, run_id: Uuid, outfit_id: &str, instruction: &str) -> Result<OutfitRecord, SessionError> {
        let record = {
            let mut runs = self.runs.write();
            let run = runs.get_mut(&run_id).ok_or(SessionError::RunNotFound(run_id))?;
            let record = run.snapshot.outfit(outfit_id).cloned().ok_or_else(|| SessionError::OutfitNotFound(outfit_id.to_string()))?;
            if !run.edits_in_flight.insert(outfit_id.to_string()) {
                return Err(SessionError::EditInProgress(outfit_id.to_string()));
            }
            record
        };

        let result = self.stylist.edit(&record, instruction).await;

        let mut runs = self.runs.write();
        let Some(run) = runs.get_mut(&run_id) else {
            return result.map_err(SessionError::from);
        };
        run.edits_in_flight.remove(outfit_id);
        let edited = result?;
        let slot = run.snapshot
            .outfit_mut(outfit_id)
            .filter(|slot| matches!(slot.state, GenerationState::Complete { .. }));
        let (Some(slot), Some(image)) = (slot, edited.generated_image()) else {
            warn!(run = %run_id, outfit = outfit_id, "Look left the complete state during the edit, discarding result");
            return Err(SessionError::EditSuperseded(outfit_id.to_string()));
        };
        // Only the image changes; anything else may have moved on meanwhile.
        slot.complete(image.to_string());
        let current = slot.clone();
        run.snapshot.updated_at = Utc::now();
        Ok(current)
    }

    pub async fn regenerate_outfit(&self, run_id: Uuid, outfit_id: &str) -> Result<OutfitRecord, SessionError> {
        let attempt = {
            let mut runs = self.runs.write();
            let run = runs.get_mut(&run_id).ok_or(SessionError::RunNotFound(run_id))?;
            if run.edits_in_flight.contains(outfit_id) {
                return Err(SessionError::EditInProgress(outfit_id.to_string()));
            }
            let slot = run.snapshot.outfit_mut(outfit_id).ok_or_else(|| SessionError::OutfitNotFound(outfit_id.to_string()))?;
            // Only settled looks restart, so at most one attempt per look is ever in flight.
            if !matches!(slot.state, GenerationState::Complete { .. } | GenerationState::Error { .. }) {
                return Err(SessionError::StillGenerating(outfit_id.to_string()));
            }
            slot.begin_generation()?;
            slot.clone()
        };

        let resolved = crate::workflow::resolve_generation(self.stylist.provider().as_ref(), attempt).await;
        if !self.apply_update(run_id, resolved.clone()) {
            debug!(run = %run_id, outfit = outfit_id, "Regenerated look no longer in its run");
        }
        Ok(resolved)
    }

    pub async fn save_outfit(&self, run_id: Uuid, outfit_id: &str) -> Result<OutfitRecord, SessionError> {
        let record = self.outfit(run_id, outfit_id)?;
        if !matches!(record.state, GenerationState::Complete { .. }) {
            return Err(SessionError::NotComplete);
        }
        let saved = prepare_for_save(&record, self.clock.next());
        self.store.put(&saved).await?;
        info!(run = %run_id, saved = %saved.id, "Look saved");
        Ok(saved)
    }

    /// Saved looks, newest first. Storage failures degrade to an empty list.
    pub async fn list_saved(&self) -> Vec<OutfitRecord> {
        match self.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Listing saved looks failed");
                Vec::new()
            }
        }
    }

    pub async fn delete_saved(&self, id: &str) -> Result<(), SessionError> {
        if !self.store.delete_by_id(id).await? {
            return Err(SessionError::SavedNotFound(id.to_string()));
        }
        info!(saved = id, "Saved look deleted");
        Ok(())
    }

    /// Regenerates a saved look. The stored copy is only replaced on success.
    pub async fn regenerate_saved(&self, id: &str) -> Result<OutfitRecord, SessionError> {
        let record = self.store
            .list_all()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| SessionError::SavedNotFound(id.to_string()))?;

        let regenerated = self.stylist.regenerate(&record).await?;
        if regenerated.generated_image().is_some() {
            self.store.put(&regenerated).await?;
            info!(saved = id, "Saved look regenerated");
        }
        Ok(regenerated)
    }
}
