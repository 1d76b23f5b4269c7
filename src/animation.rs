//! Translation animations driven by an external frame clock.
//!
//! Animations only progress when the host calls [`ViewTree::tick`](crate::ViewTree::tick).
//! Several animations may be joined in a group whose continuation runs once all of them are done,
//! which is how a caller waits on concurrent interpolations without blocking the UI thread.

use crate::tree::ViewTree;
use crate::view::ViewId;
use cgmath::Vector2;
use core::fmt;
use std::collections::HashMap;
use std::time::Duration;

/// Easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Maps linear progress in `0..=1` to eased progress.
    pub fn ease(self, t: f64) -> f64 {
        let t = t.max(0.).min(1.);
        match self {
            Easing::Linear => t,
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let u = t - 1.;
                u * u * u + 1.
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4. * t * t * t
                } else {
                    let u = 2. * t - 2.;
                    (t - 1.) * u * u + 1.
                }
            }
        }
    }
}

/// Identifies a group of joined animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u64);

/// Runs after all animations of a group have finished.
pub type Continuation = Box<dyn FnOnce(&mut ViewTree) + Send>;

#[derive(Debug, Clone, Copy)]
struct Translation {
    view: ViewId,
    from: Vector2<f64>,
    to: Vector2<f64>,
    start: Option<Duration>,
    duration: Duration,
    easing: Easing,
    group: Option<GroupId>,
}

impl Translation {
    fn progress(&self, now: Duration) -> f64 {
        if self.duration == Duration::from_secs(0) {
            return 1.;
        }
        let start = self.start.unwrap_or(now);
        let elapsed = now.checked_sub(start).unwrap_or_default();
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.)
    }

    fn value_at(&self, progress: f64) -> Vector2<f64> {
        self.from + (self.to - self.from) * self.easing.ease(progress)
    }
}

struct Group {
    pending: usize,
    on_complete: Option<Continuation>,
}

/// Results of advancing the animator by one frame.
pub(crate) struct Frame {
    pub updates: Vec<(ViewId, Vector2<f64>)>,
    pub completed: Vec<Continuation>,
}

/// Schedules translation animations.
pub struct Animator {
    now: Duration,
    next_group: u64,
    translations: Vec<Translation>,
    groups: HashMap<GroupId, Group>,
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Animator")
            .field("now", &self.now)
            .field("translations", &self.translations)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Animator {
    pub fn new() -> Animator {
        Animator {
            now: Duration::from_secs(0),
            next_group: 0,
            translations: Vec::new(),
            groups: HashMap::new(),
        }
    }

    /// The time of the last tick.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Returns true if any animation is in flight.
    pub fn is_animating(&self) -> bool {
        !self.translations.is_empty()
    }

    /// Returns true if the view has a running translation animation.
    pub fn is_animating_view(&self, view: ViewId) -> bool {
        self.translations.iter().any(|t| t.view == view)
    }

    /// Creates a group whose continuation runs once every animation added to it has finished.
    ///
    /// A group without animations completes on the next tick.
    pub(crate) fn begin_group(&mut self, on_complete: Continuation) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        self.groups.insert(
            id,
            Group {
                pending: 0,
                on_complete: Some(on_complete),
            },
        );
        id
    }

    /// Starts animating a view’s translation, replacing any translation animation it already has.
    ///
    /// The animation's clock starts on the next tick, which shows it at `from`.
    /// The replaced animation counts as finished for its group.
    pub(crate) fn translate(
        &mut self,
        view: ViewId,
        from: Vector2<f64>,
        to: Vector2<f64>,
        duration: Duration,
        easing: Easing,
        group: Option<GroupId>,
    ) {
        if let Some(pos) = self.translations.iter().position(|t| t.view == view) {
            let replaced = self.translations.remove(pos);
            if let Some(group) = replaced.group {
                self.finish_one(group);
            }
        }

        if let Some(group) = group {
            if let Some(group) = self.groups.get_mut(&group) {
                group.pending += 1;
            }
        }

        self.translations.push(Translation {
            view,
            from,
            to,
            start: None,
            duration,
            easing,
            group,
        });
    }

    fn finish_one(&mut self, group: GroupId) {
        if let Some(group) = self.groups.get_mut(&group) {
            group.pending = group.pending.saturating_sub(1);
        }
    }

    /// Advances all animations to `now`.
    pub(crate) fn advance(&mut self, now: Duration) -> Frame {
        self.now = now;

        let mut updates = Vec::with_capacity(self.translations.len());
        let mut finished_groups = Vec::new();

        let translations = std::mem::replace(&mut self.translations, Vec::new());
        for mut translation in translations {
            translation.start.get_or_insert(now);
            let progress = translation.progress(now);
            updates.push((translation.view, translation.value_at(progress)));
            if progress >= 1. {
                if let Some(group) = translation.group {
                    finished_groups.push(group);
                }
            } else {
                self.translations.push(translation);
            }
        }

        for group in finished_groups {
            self.finish_one(group);
        }

        let done: Vec<_> = self
            .groups
            .iter()
            .filter(|(_, group)| group.pending == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut completed = Vec::with_capacity(done.len());
        for id in done {
            if let Some(mut group) = self.groups.remove(&id) {
                if let Some(on_complete) = group.on_complete.take() {
                    completed.push(on_complete);
                }
            }
        }

        Frame { updates, completed }
    }

    /// Drops all animations of a view without finishing them; their groups still complete.
    pub(crate) fn cancel_view(&mut self, view: ViewId) {
        let mut groups = Vec::new();
        self.translations.retain(|t| {
            if t.view == view {
                groups.extend(t.group);
                false
            } else {
                true
            }
        });
        for group in groups {
            self.finish_one(group);
        }
    }

    /// Drops a group without running its continuation.
    pub(crate) fn abandon_group(&mut self, group: GroupId) {
        self.groups.remove(&group);
        for translation in &mut self.translations {
            if translation.group == Some(group) {
                translation.group = None;
            }
        }
    }
}

impl Default for Animator {
    fn default() -> Self {
        Animator::new()
    }
}

#[test]
fn test_easing_endpoints() {
    for easing in &[
        Easing::Linear,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
    ] {
        assert!(easing.ease(0.).abs() < 1e-12, "{:?} should start at 0", easing);
        assert!((easing.ease(1.) - 1.).abs() < 1e-12, "{:?} should end at 1", easing);
    }
    assert!((Easing::CubicInOut.ease(0.5) - 0.5).abs() < 1e-12);
    assert!(Easing::CubicInOut.ease(0.25) < 0.25, "ease-in-out starts slow");
    assert!(Easing::CubicInOut.ease(0.75) > 0.75, "ease-in-out ends slow");
}

#[test]
fn test_group_completes_after_all_members() {
    let mut animator = Animator::new();
    let group = animator.begin_group(Box::new(|_| {}));
    let (a, b) = (ViewId::new(), ViewId::new());
    let ms = Duration::from_millis;
    animator.translate(
        a,
        Vector2::new(100., 0.),
        Vector2::new(0., 0.),
        ms(100),
        Easing::Linear,
        Some(group),
    );
    animator.translate(
        b,
        Vector2::new(0., 0.),
        Vector2::new(-100., 0.),
        ms(200),
        Easing::Linear,
        Some(group),
    );

    let frame = animator.advance(ms(1000));
    assert_eq!(animator.now(), ms(1000));
    assert_eq!(frame.updates[0], (a, Vector2::new(100., 0.)), "first frame shows the start");
    assert!(frame.completed.is_empty());

    let frame = animator.advance(ms(1050));
    assert_eq!(frame.updates.len(), 2);
    assert_eq!(frame.updates[0], (a, Vector2::new(50., 0.)));
    assert!(frame.completed.is_empty());

    let frame = animator.advance(ms(1100));
    assert_eq!(frame.updates[0], (a, Vector2::new(0., 0.)), "a should land exactly on its target");
    assert!(frame.completed.is_empty(), "b is still running");
    assert!(animator.is_animating_view(b));
    assert!(!animator.is_animating_view(a));

    let frame = animator.advance(ms(1250));
    assert_eq!(frame.updates, vec![(b, Vector2::new(-100., 0.))]);
    assert_eq!(frame.completed.len(), 1, "the group should complete once");
    assert!(!animator.is_animating());
}

#[test]
fn test_zero_duration_finishes_on_first_frame() {
    let mut animator = Animator::new();
    let view = ViewId::new();
    animator.advance(Duration::from_secs(5));
    animator.translate(
        view,
        Vector2::new(10., 0.),
        Vector2::new(0., 0.),
        Duration::from_secs(0),
        Easing::CubicInOut,
        None,
    );
    let frame = animator.advance(Duration::from_secs(5));
    assert_eq!(frame.updates, vec![(view, Vector2::new(0., 0.))]);
    assert!(!animator.is_animating());
}
