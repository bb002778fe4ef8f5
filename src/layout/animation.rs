//! Animated batches of layout changes
//!
//! An [`AnimatedBatch`] bundles attribute mutations with the animation they
//! should be presented with. Batches are queued on the engine's main
//! timeline and only run from [`KeepLayout::tick`], never from the call that
//! scheduled them, so several batches scheduled in one turn can be coalesced.
//!
//! When a batch fires its mutations run first, in order. Then a transaction
//! is opened on the [`Animator`], a layout pass is forced on the affected
//! view inside it, the transaction is committed and the completion callback
//! is called exactly once.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::engine::KeepLayout;
use super::error::LayoutError;
use super::tree::ViewId;
use super::types::Frame;

/// A mutation applied when the batch fires
pub type Mutation = Box<dyn FnOnce(&mut KeepLayout) -> Result<(), LayoutError>>;

/// Called once with `finished` when the batch's transaction ends
pub type Completion = Box<dyn FnOnce(bool)>;

/// Handle to a scheduled batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub usize);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Running,
    Completed,
}

/// Timing curve of an animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationCurve {
    #[default]
    EaseInOut,
    EaseIn,
    EaseOut,
    Linear,
}

/// Options handed to the animator with each transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    pub curve: AnimationCurve,
    /// Start from the currently presented geometry instead of the model value
    pub begin_from_current_state: bool,
}

/// Deferred mutations plus the animation that presents them
pub struct AnimatedBatch {
    pub view: ViewId,
    pub duration: f64,
    pub delay: f64,
    pub options: AnimationOptions,
    mutations: Vec<Mutation>,
    completion: Option<Completion>,
}

impl fmt::Debug for AnimatedBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedBatch")
            .field("view", &self.view)
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("options", &self.options)
            .field("mutations", &self.mutations.len())
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

impl AnimatedBatch {
    pub fn new(view: ViewId, duration: f64) -> Self {
        Self {
            view,
            duration,
            delay: 0.0,
            options: AnimationOptions::default(),
            mutations: Vec::new(),
            completion: None,
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_options(mut self, options: AnimationOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a mutation; mutations run in the order they were added
    pub fn then(
        mut self,
        mutation: impl FnOnce(&mut KeepLayout) -> Result<(), LayoutError> + 'static,
    ) -> Self {
        self.mutations.push(Box::new(mutation));
        self
    }

    pub fn on_completion(mut self, completion: impl FnOnce(bool) + 'static) -> Self {
        self.completion = Some(Box::new(completion));
        self
    }
}

/// Parameters of one geometry transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transaction {
    pub batch: BatchId,
    pub view: ViewId,
    pub duration: f64,
    pub delay: f64,
    pub options: AnimationOptions,
}

/// A view moved or resized during a layout pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameChange {
    pub view: ViewId,
    pub from: Frame,
    pub to: Frame,
}

/// The animation system a batch is presented with
pub trait Animator {
    /// Open a transaction; frame changes until `commit` belong to it
    fn begin(&mut self, transaction: &Transaction);

    fn frame_changed(&mut self, change: FrameChange);

    /// Close the transaction, returning whether the animation finished
    fn commit(&mut self, transaction: &Transaction) -> bool;
}

/// What a [`RecordingAnimator`] saw for one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub changes: Vec<FrameChange>,
    pub committed: bool,
}

/// Animator that applies changes immediately and remembers every transaction.
///
/// Clones share the same log, so a caller can keep one to inspect what the
/// engine's copy recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnimator {
    log: Rc<RefCell<Vec<TransactionRecord>>>,
}

impl RecordingAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.log.borrow().clone()
    }

    /// True while a transaction is open
    pub fn is_open(&self) -> bool {
        self.log.borrow().last().is_some_and(|r| !r.committed)
    }
}

impl Animator for RecordingAnimator {
    fn begin(&mut self, transaction: &Transaction) {
        self.log.borrow_mut().push(TransactionRecord {
            transaction: *transaction,
            changes: Vec::new(),
            committed: false,
        });
    }

    fn frame_changed(&mut self, change: FrameChange) {
        if let Some(record) = self.log.borrow_mut().last_mut() {
            record.changes.push(change);
        }
    }

    fn commit(&mut self, _transaction: &Transaction) -> bool {
        if let Some(record) = self.log.borrow_mut().last_mut() {
            record.committed = true;
        }
        true
    }
}

struct Scheduled {
    id: BatchId,
    fire_at: f64,
    batch: AnimatedBatch,
}

/// How many completed batches keep a queryable state
const COMPLETED_HISTORY: usize = 256;

/// The main timeline batches are queued on
pub(crate) struct Scheduler {
    now: f64,
    next_id: usize,
    queue: Vec<Scheduled>,
    states: HashMap<BatchId, BatchState>,
    completed: VecDeque<BatchId>,
    history: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 0,
            queue: Vec::new(),
            states: HashMap::new(),
            completed: VecDeque::new(),
            history: COMPLETED_HISTORY,
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl Scheduler {
    pub(crate) fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, batch: AnimatedBatch) -> BatchId {
        let id = BatchId(self.next_id);
        self.next_id += 1;
        let fire_at = self.now + batch.delay.max(0.0);
        self.queue.push(Scheduled { id, fire_at, batch });
        self.states.insert(id, BatchState::Pending);
        id
    }

    /// Remove and return the earliest batch due at `now` that was scheduled
    /// before `horizon`
    fn pop_due(&mut self, horizon: usize) -> Option<Scheduled> {
        let now = self.now;
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, s)| s.fire_at <= now && s.id.0 < horizon)
            .min_by(|(_, a), (_, b)| a.fire_at.total_cmp(&b.fire_at).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i)?;
        Some(self.queue.remove(index))
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Record `id` as completed, forgetting the oldest completed batches
    /// beyond the history limit
    fn complete(&mut self, id: BatchId) {
        self.states.insert(id, BatchState::Completed);
        self.completed.push_back(id);
        while self.completed.len() > self.history {
            if let Some(old) = self.completed.pop_front() {
                self.states.remove(&old);
            }
        }
    }
}

impl KeepLayout {
    /// Queue `batch` to fire after its delay. It never runs before the next
    /// [`tick`](Self::tick), even with zero delay.
    pub fn animate(&mut self, batch: AnimatedBatch) -> BatchId {
        let id = self.scheduler.schedule(batch);
        debug!(batch = %id, at = self.scheduler.now(), "scheduled");
        id
    }

    /// Animate `mutation` on `view` with the configured default duration
    pub fn keep_animated(
        &mut self,
        view: ViewId,
        mutation: impl FnOnce(&mut KeepLayout) -> Result<(), LayoutError> + 'static,
    ) -> BatchId {
        let duration = self.config.animation_duration;
        self.animate(AnimatedBatch::new(view, duration).then(mutation))
    }

    /// State of a scheduled batch. Only the most recent completed batches
    /// are remembered; older ids read as `None`.
    pub fn batch_state(&self, id: BatchId) -> Option<BatchState> {
        self.scheduler.states.get(&id).copied()
    }

    pub fn pending_batches(&self) -> usize {
        self.scheduler.pending()
    }

    /// Current time on the main timeline
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Move the timeline to `now` and run every batch that is due, returning
    /// how many ran.
    ///
    /// Batches scheduled while this tick runs wait for the next one. A
    /// failing mutation still completes its batch (with `finished = false`);
    /// the error is returned and later batches wait for the next tick.
    pub fn tick(&mut self, now: f64) -> Result<usize, LayoutError> {
        self.scheduler.now = self.scheduler.now.max(now);
        let horizon = self.scheduler.next_id;
        let mut ran = 0;
        while let Some(scheduled) = self.scheduler.pop_due(horizon) {
            ran += 1;
            self.run_batch(scheduled)?;
        }
        Ok(ran)
    }

    /// Advance the timeline by `dt` seconds
    pub fn advance(&mut self, dt: f64) -> Result<usize, LayoutError> {
        let now = self.scheduler.now + dt.max(0.0);
        self.tick(now)
    }

    fn run_batch(&mut self, scheduled: Scheduled) -> Result<(), LayoutError> {
        let Scheduled { id, batch, .. } = scheduled;
        let AnimatedBatch {
            view,
            duration,
            delay,
            options,
            mutations,
            completion,
        } = batch;
        self.scheduler.states.insert(id, BatchState::Running);
        debug!(batch = %id, mutations = mutations.len(), "running");

        let mut failure = None;
        for mutation in mutations {
            if let Err(err) = mutation(self) {
                warn!(batch = %id, error = %err, "mutation failed; skipping the rest of the batch");
                failure = Some(err);
                break;
            }
        }

        let transaction = Transaction {
            batch: id,
            view,
            duration,
            delay,
            options,
        };
        self.animator.begin(&transaction);
        let layout = self.layout_pass(view);
        if let Ok(changes) = &layout {
            for change in changes {
                self.animator.frame_changed(*change);
            }
        }
        let finished = self.animator.commit(&transaction);

        let failure = failure.or(layout.err());
        if let Some(completion) = completion {
            completion(finished && failure.is_none());
        }
        self.scheduler.complete(id);
        debug!(batch = %id, finished, "completed");
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::priority::Priority;
    use crate::layout::relation::AttributeKind;
    use std::cell::Cell;

    fn setup() -> (KeepLayout, RecordingAnimator, ViewId, ViewId) {
        let animator = RecordingAnimator::new();
        let mut layout = KeepLayout::new().with_animator(Box::new(animator.clone()));
        let root = layout.add_root(Some("root"), Frame::new(0.0, 0.0, 200.0, 200.0));
        let view = layout.add_subview(root, Some("view")).unwrap();
        (layout, animator, root, view)
    }

    #[test]
    fn test_zero_delay_batch_waits_for_tick() {
        let (mut layout, animator, root, view) = setup();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let id = layout.animate(AnimatedBatch::new(root, 0.3).then(move |layout| {
            flag.set(true);
            let width = layout.keep_width(view)?;
            layout.set_value(width, 80.0, Priority::REQUIRED)
        }));

        assert!(!ran.get());
        assert_eq!(layout.batch_state(id), Some(BatchState::Pending));
        assert!(animator.transactions().is_empty());

        assert_eq!(layout.tick(0.0).unwrap(), 1);
        assert!(ran.get());
        assert_eq!(layout.batch_state(id), Some(BatchState::Completed));
    }

    #[test]
    fn test_layout_pass_sees_mutations_and_completion_fires_once() {
        let (mut layout, animator, root, view) = setup();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let probe = animator.clone();
        layout.animate(
            AnimatedBatch::new(root, 0.3)
                .then(move |layout| {
                    let width = layout.keep_width(view)?;
                    layout.set_value(width, 120.0, Priority::REQUIRED)
                })
                .on_completion(move |finished| {
                    assert!(finished);
                    assert!(!probe.is_open(), "completion runs after the transaction");
                    seen.set(seen.get() + 1);
                }),
        );
        layout.tick(0.0).unwrap();
        layout.tick(1.0).unwrap();

        assert_eq!(calls.get(), 1);
        let records = animator.transactions();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction.duration, 0.3);
        assert!(records[0].committed);
        let change = records[0]
            .changes
            .iter()
            .find(|c| c.view == view)
            .expect("view frame should change inside the transaction");
        assert!((change.to.width - 120.0).abs() < 0.001);
        assert!((layout.frame(view).unwrap().width - 120.0).abs() < 0.001);
    }

    #[test]
    fn test_delay_is_respected_and_order_is_kept() {
        let (mut layout, _, root, view) = setup();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (late, early, same) = (order.clone(), order.clone(), order.clone());
        layout.animate(
            AnimatedBatch::new(root, 0.1)
                .with_delay(0.5)
                .then(move |_| {
                    late.borrow_mut().push("late");
                    Ok(())
                }),
        );
        layout.animate(AnimatedBatch::new(root, 0.1).then(move |layout| {
            early.borrow_mut().push("early");
            let height = layout.keep_height(view)?;
            layout.set_value(height, 10.0, Priority::REQUIRED)
        }));
        layout.animate(AnimatedBatch::new(root, 0.1).then(move |layout| {
            // sees the first zero-delay batch's change
            let height = layout.keep_height(view)?;
            assert_eq!(layout.value(height)?, 10.0);
            same.borrow_mut().push("same");
            Ok(())
        }));

        assert_eq!(layout.tick(0.2).unwrap(), 2);
        assert_eq!(*order.borrow(), vec!["early", "same"]);
        assert_eq!(layout.pending_batches(), 1);
        assert_eq!(layout.advance(0.4).unwrap(), 1);
        assert_eq!(*order.borrow(), vec!["early", "same", "late"]);
    }

    #[test]
    fn test_failed_mutation_completes_unfinished() {
        let (mut layout, animator, root, view) = setup();
        let loner = layout.add_root(Some("loner"), Frame::zero());
        let result = Rc::new(Cell::new(None));
        let sink = result.clone();
        let id = layout.animate(
            AnimatedBatch::new(root, 0.2)
                .then(move |layout| {
                    let align = layout.attribute(view, AttributeKind::TopAlign, Some(loner))?;
                    layout.set_value(align, 0.0, Priority::REQUIRED)
                })
                .on_completion(move |finished| sink.set(Some(finished))),
        );

        let err = layout.tick(0.0).unwrap_err();
        assert!(matches!(err, LayoutError::DisconnectedHierarchy { .. }));
        assert_eq!(result.get(), Some(false));
        assert_eq!(layout.batch_state(id), Some(BatchState::Completed));
        assert_eq!(animator.transactions().len(), 1);
    }

    #[test]
    fn test_batch_scheduled_during_tick_waits_for_next_tick() {
        let (mut layout, _, root, _) = setup();
        let inner = Rc::new(Cell::new(None));
        let slot = inner.clone();
        layout.animate(AnimatedBatch::new(root, 0.1).then(move |layout| {
            slot.set(Some(layout.animate(AnimatedBatch::new(root, 0.1))));
            Ok(())
        }));

        assert_eq!(layout.tick(0.0).unwrap(), 1);
        let nested = inner.get().unwrap();
        assert_eq!(layout.batch_state(nested), Some(BatchState::Pending));
        assert_eq!(layout.tick(0.0).unwrap(), 1);
        assert_eq!(layout.batch_state(nested), Some(BatchState::Completed));
    }

    #[test]
    fn test_keep_animated_uses_default_duration() {
        let (mut layout, animator, _, view) = setup();
        layout.keep_animated(view, |_| Ok(()));
        layout.tick(0.0).unwrap();
        let records = animator.transactions();
        assert_eq!(records[0].transaction.duration, layout.config().animation_duration);
    }

    #[test]
    fn test_completed_history_is_bounded() {
        let (mut layout, _, root, _) = setup();
        layout.scheduler.history = 2;
        let ids: Vec<_> = (0..4)
            .map(|_| layout.animate(AnimatedBatch::new(root, 0.0)))
            .collect();
        let pending = layout.animate(AnimatedBatch::new(root, 0.0).with_delay(5.0));

        assert_eq!(layout.tick(0.0).unwrap(), 4);
        assert_eq!(layout.batch_state(ids[0]), None);
        assert_eq!(layout.batch_state(ids[1]), None);
        assert_eq!(layout.batch_state(ids[2]), Some(BatchState::Completed));
        assert_eq!(layout.batch_state(ids[3]), Some(BatchState::Completed));
        assert_eq!(layout.batch_state(pending), Some(BatchState::Pending));
        assert_eq!(layout.scheduler.states.len(), 3);
    }
}
