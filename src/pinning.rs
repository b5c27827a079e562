//! Full-viewport slide pinning for the vertical section stack.

use crate::{
    completion::CompletionReader,
    core::Direction,
    observer::{ObserverEvent, ObserverHandle, ScrollObserver, ScrollPolicy},
    runtime::ScrollCommand,
    scene::{ElementId, Scene},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionRole {
    /// Pinned for one viewport height; the next section scrolls over it.
    Slide,
    /// A slide that refuses to let scroll advance past its start until its section completes.
    Gated,
    /// Stand-in for the horizontal strip, which pins itself.
    StripPlaceholder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionSpec {
    pub element: ElementId,
    pub role: SectionRole,
}

#[derive(Debug, Default)]
pub struct SectionPinning {
    slides: Vec<(ObserverHandle, SectionRole)>,
    gate: Option<CompletionReader>,
    gate_active: bool,
}

impl SectionPinning {
    /// Registers every non-placeholder section as a slide.
    ///
    /// If any section is not mounted the whole controller stays empty (with a warning) and its
    /// teardown is a no-op.
    #[tracing::instrument(skip_all, fields(sections = sections.len()))]
    pub fn mount(
        observer: &mut ScrollObserver,
        scene: &Scene,
        sections: &[SectionSpec],
        completion: CompletionReader,
    ) -> Self {
        if let Some(missing) = sections.iter().find(|s| !scene.is_mounted(s.element)) {
            tracing::warn!(element = missing.element.0, "section not mounted; pinning skipped");
            return Self::default();
        }

        let mut slides = Vec::with_capacity(sections.len());
        for s in sections {
            if s.role == SectionRole::StripPlaceholder {
                continue;
            }
            match observer.register(scene, s.element, ScrollPolicy::slide()) {
                Ok(h) => slides.push((h, s.role)),
                Err(e) => {
                    tracing::warn!(error = %e, "slide registration failed; pinning skipped");
                    for (h, _) in slides {
                        observer.unregister(h);
                    }
                    return Self::default();
                }
            }
        }

        Self {
            slides,
            gate: Some(completion),
            gate_active: true,
        }
    }

    /// Enables or disables the completion gate (a continuously scrubbed gallery gates itself).
    pub fn set_gate_active(&mut self, active: bool) {
        self.gate_active = active;
    }

    pub fn is_gate_active(&self) -> bool {
        self.gate_active
    }

    /// Reacts to one observer event. A gated slide entered, re-entered or pushed forward while
    /// its section is incomplete is forced back to its start.
    pub fn on_observer(
        &self,
        observer: &ScrollObserver,
        handle: ObserverHandle,
        event: ObserverEvent,
    ) -> Option<ScrollCommand> {
        let &(h, role) = self.slides.iter().find(|(h, _)| *h == handle)?;
        if role != SectionRole::Gated || !self.gate_active {
            return None;
        }
        if self.gate.as_ref().is_none_or(CompletionReader::is_complete) {
            return None;
        }

        let clamp = match event {
            ObserverEvent::Enter | ObserverEvent::EnterBack => true,
            ObserverEvent::Update {
                progress,
                direction,
            } => progress > 0.0 && direction == Direction::Forward,
            _ => false,
        };
        if !clamp {
            return None;
        }
        let (start, _) = observer.span(h)?;
        tracing::debug!(start, "gated section incomplete; clamping scroll");
        Some(ScrollCommand::ScrollTo(start))
    }

    pub fn handles(&self) -> impl Iterator<Item = ObserverHandle> + '_ {
        self.slides.iter().map(|(h, _)| *h)
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn unmount(&mut self, observer: &mut ScrollObserver) {
        for (h, _) in self.slides.drain(..) {
            observer.unregister(h);
        }
        self.gate = None;
    }
}
