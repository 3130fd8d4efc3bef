//! In-memory page used by tests and the offline demo.
//!
//! A [`ScriptedSite`] is a set of routes. Each route owns the elements rendered when
//! the current URL contains its marker, optionally redirecting elsewhere. Elements can
//! appear late, stay hidden, be covered by overlays or refuse forced input, which is
//! enough to exercise every fallback path of the engine deterministically. All timing
//! uses `tokio::time`, so tests can run with a paused clock.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;
use waypoint_core_types::{
    CandidateQuery, DomScope, ElementHandle, ElementState, Interaction, LoadState, PageId,
};

use crate::driver::PageDriver;
use crate::error::{AdapterError, AdapterErrorKind};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Side effect of activating (clicking, checking) an element.
#[derive(Clone, Debug)]
pub enum Effect {
    /// Load another route, as a link or form submission would.
    Navigate(String),
    Show(String),
    Hide(String),
    Detach(String),
}

#[derive(Clone, Debug)]
pub struct ScriptedElement {
    pub id: String,
    pub role: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub test_id: Option<String>,
    pub placeholder: Option<String>,
    pub label: Option<String>,
    /// CSS selectors this element answers to, matched literally.
    pub selectors: Vec<String>,
    pub parent: Option<String>,
    pub visible: bool,
    /// Not in the DOM until this long after the route loaded.
    pub appears_after: Option<Duration>,
    pub checked: Option<bool>,
    pub disabled: bool,
    /// Another element intercepts pointer input; standard interactions fail.
    pub covered: bool,
    /// Input simulation cannot reach the element at all; forced interactions fail.
    pub unreachable: bool,
    pub on_activate: Vec<Effect>,
}

impl ScriptedElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            name: None,
            text: None,
            test_id: None,
            placeholder: None,
            label: None,
            selectors: Vec::new(),
            parent: None,
            visible: true,
            appears_after: None,
            checked: None,
            disabled: false,
            covered: false,
            unreachable: false,
            on_activate: Vec::new(),
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn css(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    pub fn checkbox(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn covered(mut self) -> Self {
        self.covered = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn on_activate(mut self, effect: Effect) -> Self {
        self.on_activate.push(effect);
        self
    }

    fn accessible_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.label.as_deref())
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    fn matches(&self, query: &CandidateQuery) -> bool {
        match query {
            CandidateQuery::TestId(m) => self.test_id.as_deref().map_or(false, |v| m.matches(v)),
            CandidateQuery::Role { role, name } => {
                self.role.as_deref() == Some(role.as_str())
                    && name.as_ref().map_or(true, |m| m.matches(self.accessible_name()))
            }
            CandidateQuery::Text(m) => self.text.as_deref().map_or(false, |v| m.matches(v)),
            CandidateQuery::Placeholder(m) => {
                self.placeholder.as_deref().map_or(false, |v| m.matches(v))
            }
            CandidateQuery::Label(m) => self.label.as_deref().map_or(false, |v| m.matches(v)),
            CandidateQuery::Css(selector) => self.selectors.iter().any(|s| s == selector),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Route {
    /// The route applies when the URL contains this marker.
    pub marker: String,
    pub redirect: Option<String>,
    pub elements: Vec<ScriptedElement>,
    /// Time from navigation start until the `load` milestone.
    pub load_delay: Duration,
}

impl Route {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            redirect: None,
            elements: Vec::new(),
            load_delay: Duration::ZERO,
        }
    }

    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect = Some(url.into());
        self
    }

    pub fn element(mut self, element: ScriptedElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

/// Routes are tried in order; the first whose marker the URL contains wins.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSite {
    pub routes: Vec<Route>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    fn resolve(&self, url: &str) -> Option<&Route> {
        self.routes.iter().find(|route| url.contains(&route.marker))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPath {
    Standard,
    Forced,
    Programmatic,
}

/// One interaction the page accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionRecord {
    pub element: String,
    pub interaction: String,
    pub path: InputPath,
}

#[derive(Clone, Debug)]
struct LiveElement {
    spec: ScriptedElement,
    detached: bool,
    value: String,
}

struct PageState {
    url: String,
    generation: u64,
    loaded_at: Instant,
    load_delay: Duration,
    elements: Vec<LiveElement>,
    interactions: Vec<InteractionRecord>,
    navigations: Vec<String>,
}

pub struct ScriptedDriver {
    site: ScriptedSite,
    page_id: PageId,
    state: Mutex<PageState>,
}

impl ScriptedDriver {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site,
            page_id: PageId::new(),
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                generation: 0,
                loaded_at: Instant::now(),
                load_delay: Duration::ZERO,
                elements: Vec::new(),
                interactions: Vec::new(),
                navigations: Vec::new(),
            }),
        }
    }

    /// Interactions accepted so far, in order.
    pub fn interactions(&self) -> Vec<InteractionRecord> {
        self.state.lock().interactions.clone()
    }

    /// Every URL the page has been asked to load, including redirects.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    /// Value last filled into `element`.
    pub fn value_of(&self, element: &str) -> Option<String> {
        self.state
            .lock()
            .elements
            .iter()
            .find(|e| e.spec.id == element)
            .map(|e| e.value.clone())
    }

    pub fn is_checked(&self, element: &str) -> Option<bool> {
        self.state
            .lock()
            .elements
            .iter()
            .find(|e| e.spec.id == element)
            .and_then(|e| e.spec.checked)
    }

    fn load(&self, state: &mut PageState, url: &str) {
        let mut target = url.to_string();
        // Bounded so a redirect cycle cannot spin forever.
        for _ in 0..8 {
            state.navigations.push(target.clone());
            match self.site.resolve(&target) {
                Some(route) if route.redirect.is_some() => {
                    target = route.redirect.clone().unwrap_or_default();
                }
                _ => break,
            }
        }

        let route = self.site.resolve(&target);
        state.url = target;
        state.generation += 1;
        state.loaded_at = Instant::now();
        state.load_delay = route.map(|r| r.load_delay).unwrap_or_default();
        state.elements = route
            .map(|r| {
                r.elements
                    .iter()
                    .cloned()
                    .map(|spec| LiveElement {
                        spec,
                        detached: false,
                        value: String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        debug!(url = %state.url, generation = state.generation, "scripted page loaded");
    }

    fn node_ref(generation: u64, id: &str) -> String {
        format!("{}:{}", generation, id)
    }

    /// Index of the live element behind `handle`, if it is still in the DOM.
    fn locate(state: &PageState, handle: &ElementHandle) -> Option<usize> {
        let (generation, id) = handle.node_ref.split_once(':')?;
        if generation.parse::<u64>().ok()? != state.generation {
            return None;
        }
        state
            .elements
            .iter()
            .position(|e| e.spec.id == id && Self::in_dom(state, e))
    }

    fn in_dom(state: &PageState, element: &LiveElement) -> bool {
        if element.detached {
            return false;
        }
        match element.spec.appears_after {
            Some(delay) => state.loaded_at.elapsed() >= delay,
            None => true,
        }
    }

    fn is_descendant(state: &PageState, element: &LiveElement, ancestor: &str) -> bool {
        let mut parent = element.spec.parent.clone();
        while let Some(id) = parent {
            if id == ancestor {
                return true;
            }
            parent = state
                .elements
                .iter()
                .find(|e| e.spec.id == id)
                .and_then(|e| e.spec.parent.clone());
        }
        false
    }

    fn apply(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        path: InputPath,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        let index =
            Self::locate(&state, handle).ok_or_else(|| AdapterError::stale(&handle.node_ref))?;

        let activate = match interaction {
            Interaction::Click => {
                let element = &mut state.elements[index];
                if let Some(checked) = element.spec.checked {
                    element.spec.checked = Some(!checked);
                }
                true
            }
            Interaction::Fill(text) => {
                state.elements[index].value = text.expose().to_string();
                false
            }
            Interaction::Check => match state.elements[index].spec.checked {
                None => {
                    return Err(AdapterError::not_interactable("element has no checked state"))
                }
                Some(true) => false,
                Some(false) => {
                    state.elements[index].spec.checked = Some(true);
                    true
                }
            },
        };

        let element_id = state.elements[index].spec.id.clone();
        state.interactions.push(InteractionRecord {
            element: element_id,
            interaction: interaction.to_string(),
            path,
        });

        if activate {
            let effects = state.elements[index].spec.on_activate.clone();
            for effect in effects {
                match effect {
                    Effect::Navigate(url) => self.load(&mut state, &url),
                    Effect::Show(id) => Self::update(&mut state, &id, |e| {
                        e.spec.visible = true;
                        e.detached = false;
                    }),
                    Effect::Hide(id) => Self::update(&mut state, &id, |e| e.spec.visible = false),
                    Effect::Detach(id) => Self::update(&mut state, &id, |e| e.detached = true),
                }
            }
        }
        Ok(())
    }

    fn update(state: &mut PageState, id: &str, f: impl Fn(&mut LiveElement)) {
        if let Some(element) = state.elements.iter_mut().find(|e| e.spec.id == id) {
            f(element);
        }
    }

    /// Why standard input cannot reach the element right now, if anything.
    fn blocker(&self, handle: &ElementHandle) -> Result<Option<&'static str>, AdapterError> {
        let state = self.state.lock();
        let index =
            Self::locate(&state, handle).ok_or_else(|| AdapterError::stale(&handle.node_ref))?;
        let spec = &state.elements[index].spec;
        Ok(if !spec.visible {
            Some("element is not visible")
        } else if spec.disabled {
            Some("element is disabled")
        } else if spec.unreachable {
            Some("element is outside of the viewport")
        } else if spec.covered {
            Some("element is covered by another element")
        } else {
            None
        })
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(
        &self,
        url: &str,
        readiness: LoadState,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        {
            let mut state = self.state.lock();
            self.load(&mut state, url);
        }
        self.wait_for_load_state(readiness, timeout)
            .await
            .map_err(|err| match err.kind {
                AdapterErrorKind::Timeout => {
                    AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(format!(
                        "{} never reached {}",
                        url,
                        readiness.name()
                    ))
                }
                _ => err,
            })
    }

    async fn query_all(
        &self,
        scope: &DomScope,
        query: &CandidateQuery,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let state = self.state.lock();
        let within = match scope {
            DomScope::Document => None,
            DomScope::Within(handle) => {
                let index = Self::locate(&state, handle)
                    .ok_or_else(|| AdapterError::stale(&handle.node_ref))?;
                Some(state.elements[index].spec.id.clone())
            }
        };

        Ok(state
            .elements
            .iter()
            .filter(|e| Self::in_dom(&state, e))
            .filter(|e| {
                within
                    .as_deref()
                    .map_or(true, |ancestor| Self::is_descendant(&state, e, ancestor))
            })
            .filter(|e| e.spec.matches(query))
            .map(|e| {
                ElementHandle::new(
                    self.page_id.clone(),
                    Self::node_ref(state.generation, &e.spec.id),
                )
            })
            .collect())
    }

    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError> {
        let state = self.state.lock();
        Ok(match Self::locate(&state, handle) {
            Some(index) => {
                let spec = &state.elements[index].spec;
                ElementState {
                    attached: true,
                    visible: spec.visible,
                    checked: spec.checked,
                }
            }
            None => ElementState::default(),
        })
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let ready_at = {
            let page = self.state.lock();
            match state {
                LoadState::DomContentLoaded => page.loaded_at,
                LoadState::Load => page.loaded_at + page.load_delay,
            }
        };
        let now = Instant::now();
        if ready_at <= now {
            return Ok(());
        }
        if ready_at - now > timeout {
            tokio::time::sleep(timeout).await;
            return Err(AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(format!("page did not reach {}", state.name())));
        }
        tokio::time::sleep_until(ready_at).await;
        Ok(())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        let state = self.state.lock();
        Self::locate(&state, handle)
            .map(|_| ())
            .ok_or_else(|| AdapterError::stale(&handle.node_ref))
    }

    async fn interact(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.blocker(handle)? {
                None => return self.apply(handle, interaction, InputPath::Standard),
                Some(reason) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(AdapterError::not_interactable(reason));
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
            }
        }
    }

    async fn interact_forced(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        let unreachable = {
            let state = self.state.lock();
            let index = Self::locate(&state, handle)
                .ok_or_else(|| AdapterError::stale(&handle.node_ref))?;
            state.elements[index].spec.unreachable
        };
        if unreachable {
            return Err(AdapterError::not_interactable(
                "element is outside of the viewport",
            ));
        }
        self.apply(handle, interaction, InputPath::Forced)
    }

    async fn invoke(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
    ) -> Result<(), AdapterError> {
        self.apply(handle, interaction, InputPath::Programmatic)
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self.state.lock().url.clone())
    }
}
