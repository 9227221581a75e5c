//! Dice service trait and implementations.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{DuelId, UserId};
use domain::DiceValue;
use rand::Rng;

use crate::error::CommandError;

/// Server-side source of dice rolls.
#[async_trait]
pub trait DiceService: Send + Sync {
    async fn roll_dice(&self, user_id: UserId, duel_id: &DuelId) -> Result<DiceValue, CommandError>;
}

/// Rolls with the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDiceService;

impl RandomDiceService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiceService for RandomDiceService {
    async fn roll_dice(&self, _user_id: UserId, _duel_id: &DuelId) -> Result<DiceValue, CommandError> {
        let face = rand::thread_rng().gen_range(1..=6);
        Ok(DiceValue::new(face)?)
    }
}

#[derive(Debug, Default)]
struct ScriptedDiceState {
    faces: VecDeque<u8>,
    fail: bool,
    calls: usize,
}

/// Returns pre-arranged faces in order. Fails once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDiceService {
    state: Arc<Mutex<ScriptedDiceState>>,
}

impl ScriptedDiceService {
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
        let service = Self::default();
        service.push(faces);
        service
    }

    /// Appends faces to the script.
    pub fn push(&self, faces: impl IntoIterator<Item = u8>) {
        self.lock().faces.extend(faces);
    }

    /// Configures every roll to fail.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    /// Returns the number of rolls served so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedDiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DiceService for ScriptedDiceService {
    async fn roll_dice(&self, _user_id: UserId, _duel_id: &DuelId) -> Result<DiceValue, CommandError> {
        let mut state = self.lock();

        if state.fail {
            return Err(CommandError::Dice("dice service unavailable".to_string()));
        }

        let face = state
            .faces
            .pop_front()
            .ok_or_else(|| CommandError::Dice("no scripted roll left".to_string()))?;
        state.calls += 1;
        Ok(DiceValue::new(face)?)
    }
}
