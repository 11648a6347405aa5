//! Event loop
//!
//! Owns the store, the drag engine and the virtual list, and routes
//! terminal input and store completions between them on a single task.

use crate::cli::Opts;
use crate::config::ClipdeckConfig;
use crate::core::debug_logger;
use crate::core::item::ItemId;
use crate::drag::{CancelReason, Direction, DragEngine, DragLog, DragOutcome, RegionRole};
use crate::gateway::Gateway;
use crate::keybinds::{Action, Keybinds};
use crate::store::{ItemStore, StoreConfig, StoreEvents, StoreMessage};
use crate::ui::{
    self, Align, AsyncInput, InputEvent, NavKey, NavOutcome, Navigator, RenderedFrame,
    ScrollVelocity, Theme, ViewModel, VirtualList,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use eyre::Result;
use ratatui::backend::Backend;
use ratatui::Terminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rows scrolled per wheel notch
const WHEEL_ROWS: i32 = 3;
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Keeps the cursor on an item across a pin or move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Follow {
    id: ItemId,
    /// Generation of the refetch issued when the mutation settled
    refetch: Option<u64>,
}

pub struct App {
    store: ItemStore,
    engine: DragEngine,
    list: VirtualList,
    navigator: Navigator,
    keybinds: Keybinds,
    theme: Theme,
    rendered: RenderedFrame,
    groups: Vec<String>,
    follow: Option<Follow>,
    status: Option<(String, Instant)>,
    search_deadline: Option<Instant>,
    debounce: Duration,
    dirty: bool,
    quit: bool,
    chosen: Option<ItemId>,
}

impl App {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        config: &ClipdeckConfig,
        opts: &Opts,
        theme: Theme,
    ) -> (Self, StoreEvents) {
        let (mut store, events) = ItemStore::create(
            gateway,
            StoreConfig {
                page_size: config.list.page_size,
            },
        );

        let policy = opts.policy.unwrap_or(config.drag.policy);
        let mut engine = DragEngine::new(policy, config.drag.activation_distance);
        engine.add_observer(Box::new(DragLog));

        let list = VirtualList::new(
            config.list.max_preview_lines,
            config.list.overscan,
            ScrollVelocity::new(
                config.scroll.fast_enter_rows_per_sec,
                config.scroll.fast_exit_rows_per_sec,
            ),
        );

        if let Some(search) = &opts.search_string {
            store.set_search_query(search.clone());
        }
        match (&opts.group, opts.favorites) {
            (Some(group), favorites) => {
                if favorites {
                    store.set_favorite_only(true);
                }
                store.set_selected_group(Some(group.clone()));
            }
            (None, true) => store.set_favorite_only(true),
            (None, false) => store.fetch(),
        }

        let app = Self {
            store,
            engine,
            list,
            navigator: Navigator::default(),
            keybinds: config.keybinds.clone(),
            theme,
            rendered: RenderedFrame::default(),
            groups: Vec::new(),
            follow: None,
            status: None,
            search_deadline: None,
            debounce: Duration::from_millis(config.list.search_debounce_ms),
            dirty: true,
            quit: false,
            chosen: None,
        };
        (app, events)
    }

    pub fn set_groups(&mut self, groups: Vec<String>) {
        self.groups = groups;
    }

    pub fn listen_external(&mut self) {
        if let Err(e) = self.store.listen_external() {
            debug_logger::log_error("subscribe to backend changes", &e);
            self.set_status("live updates unavailable");
        }
    }

    /// Run until the user quits. Returns the entry chosen with Enter.
    pub async fn run<B>(
        mut self,
        terminal: &mut Terminal<B>,
        mut input: AsyncInput,
        mut events: StoreEvents,
    ) -> Result<Option<ItemId>>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        self.render(terminal)?;
        while !self.quit {
            tokio::select! {
                Some(message) = events.next() => self.on_store_message(message),
                event = input.next() => match event {
                    Some(InputEvent::Key(key)) => self.handle_key(key),
                    Some(InputEvent::Mouse(mouse)) => self.handle_mouse(mouse, Instant::now()),
                    Some(InputEvent::Paste(text)) => self.push_search(&text),
                    Some(InputEvent::Resize) => self.dirty = true,
                    Some(InputEvent::Tick) => self.tick(Instant::now()),
                    Some(InputEvent::Render) => {
                        if self.dirty {
                            self.render(terminal)?;
                        }
                    }
                    None => break,
                },
            }
        }
        self.store.dispose();
        Ok(self.chosen)
    }

    pub fn render<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        self.list.on_reset_token(self.store.reset_token());
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let view = ViewModel {
            items: self.store.items(),
            active_index: self.store.active_index(),
            search_query: self.store.search_query(),
            selected_group: self.store.selected_group(),
            favorite_only: self.store.favorite_only(),
            is_loading: self.store.is_loading(),
            status: self.status.as_ref().map(|(text, _)| text.as_str()),
            drag: self.engine.active_session(),
            dragged: self.engine.active_item(),
            now,
        };
        let list = &mut self.list;
        let theme = &self.theme;
        let mut rendered = RenderedFrame::default();
        terminal.draw(|f| rendered = ui::draw(f, &view, list, theme))?;
        self.rendered = rendered;
        self.dirty = false;
        Ok(())
    }

    fn on_store_message(&mut self, message: StoreMessage) {
        let settled = self.store.handle(message);
        if let (Some(settled), Some(follow)) = (settled, self.follow.as_mut()) {
            if settled.mutation.subject() == follow.id {
                follow.refetch = Some(settled.refetch);
            }
        }

        if !self.store.is_loading() {
            if let Some(Follow {
                id,
                refetch: Some(refetch),
            }) = self.follow
            {
                if self.store.fetch_generation() >= refetch {
                    self.follow = None;
                    if let Some(index) = self.store.index_of(id) {
                        self.store.set_active_index(Some(index));
                        self.list.scroll_to_index(index, Align::Auto);
                    }
                }
            }
            self.list.retain_measured(self.store.items());
        }
        self.dirty = true;
    }

    fn follow_item(&mut self, id: ItemId) {
        self.follow = Some(Follow { id, refetch: None });
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some((text.into(), Instant::now()));
        self.dirty = true;
    }

    pub fn tick(&mut self, now: Instant) {
        if self.list.tick(now) {
            self.dirty = true;
        }
        if self.search_deadline.is_some_and(|deadline| now >= deadline) {
            self.search_deadline = None;
            self.store.fetch();
            self.dirty = true;
        }
        if self
            .status
            .as_ref()
            .is_some_and(|(_, at)| now.duration_since(*at) > STATUS_TTL)
        {
            self.status = None;
            self.dirty = true;
        }
    }

    fn push_search(&mut self, text: &str) {
        let mut query = self.store.search_query().to_string();
        query.push_str(&ui::sanitize_line(text));
        self.update_search(query);
    }

    fn update_search(&mut self, query: String) {
        self.store.set_search_query(query);
        self.search_deadline = Some(Instant::now() + self.debounce);
        self.dirty = true;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.dirty = true;
        if key.code == KeyCode::Esc && self.engine.is_dragging() {
            self.engine.cancel(CancelReason::Escape);
            self.set_status("drag cancelled");
            return;
        }

        let Some(action) = self.keybinds.action(key.code, key.modifiers) else {
            match key.code {
                KeyCode::Char(c)
                    if key.modifiers == KeyModifiers::NONE
                        || key.modifiers == KeyModifiers::SHIFT =>
                {
                    let mut query = self.store.search_query().to_string();
                    query.push(c);
                    self.update_search(query);
                }
                KeyCode::Backspace => {
                    let mut query = self.store.search_query().to_string();
                    if query.pop().is_some() {
                        self.update_search(query);
                    }
                }
                _ => {}
            }
            return;
        };

        match action {
            Action::Up => self.navigate(NavKey::Up),
            Action::Down => self.navigate(NavKey::Down),
            Action::PageUp => self.navigate(NavKey::PageUp),
            Action::PageDown => self.navigate(NavKey::PageDown),
            Action::End => self.navigate(NavKey::End),
            Action::ScrollTop => {
                if !self.store.is_empty() {
                    self.store.set_active_index(Some(0));
                }
                self.list.scroll_to_top(true);
            }
            Action::Select => self.navigate(NavKey::Enter),
            Action::Delete => self.navigate(NavKey::Delete),
            Action::Pin => {
                if let Some(item) = self.store.active_item() {
                    let id = item.id;
                    self.follow_item(id);
                    self.store.toggle_pin(id);
                }
            }
            Action::Favorite => {
                if let Some(item) = self.store.active_item() {
                    let id = item.id;
                    self.store.toggle_favorite(id);
                }
            }
            Action::MoveUp => self.keyboard_move(Direction::Up),
            Action::MoveDown => self.keyboard_move(Direction::Down),
            Action::Reset => {
                self.search_deadline = None;
                self.engine.cancel(CancelReason::Interrupted);
                self.follow = None;
                self.store.reset_view();
            }
            Action::CycleGroup => {
                let next = match self.store.selected_group() {
                    None => self.groups.first().cloned(),
                    Some(current) => self
                        .groups
                        .iter()
                        .position(|group| group == current)
                        .and_then(|pos| self.groups.get(pos + 1))
                        .cloned(),
                };
                self.store.set_selected_group(next);
            }
            Action::FavoritesOnly => {
                let favorite_only = !self.store.favorite_only();
                self.store.set_favorite_only(favorite_only);
            }
            Action::Exit => self.quit = true,
        }
    }

    fn navigate(&mut self, key: NavKey) {
        match self.navigator.handle(key, &self.store) {
            NavOutcome::Unchanged => {}
            NavOutcome::Moved(index) => {
                self.store.set_active_index(Some(index));
                self.list.scroll_to_index(index, Align::Auto);
            }
            NavOutcome::Activate(id) => {
                self.chosen = Some(id);
                self.quit = true;
            }
            NavOutcome::Delete(id) => self.store.delete(id),
        }
    }

    fn keyboard_move(&mut self, direction: Direction) {
        let intent =
            self.engine
                .keyboard_move(self.store.items(), self.store.active_index(), direction);
        if let Some(intent) = intent {
            self.follow_item(intent.from);
            self.store.reorder(intent);
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let (column, row) = (mouse.column, mouse.row);
        let list_area = self.rendered.list_area;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let outcome = self.engine.pointer_down(
                    column,
                    row,
                    &self.rendered.hits,
                    &self.rendered.slots,
                    self.store.items(),
                );
                if outcome == DragOutcome::Ignored {
                    self.click_control(column, row);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let outcome =
                    self.engine
                        .pointer_move(column, row, &self.rendered.slots, list_area);
                if outcome != DragOutcome::Ignored {
                    // Dragging onto the list edges scrolls it
                    if row <= list_area.y {
                        self.list.scroll_by(-1, now);
                    } else if row.saturating_add(1) >= list_area.bottom() {
                        self.list.scroll_by(1, now);
                    }
                    self.dirty = true;
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                match self
                    .engine
                    .pointer_up(column, row, &self.rendered.slots, list_area)
                {
                    DragOutcome::Dropped(intent) => {
                        self.follow_item(intent.from);
                        self.store.reorder(intent);
                    }
                    DragOutcome::Clicked(index) => self.store.set_active_index(Some(index)),
                    DragOutcome::Cancelled(_) => self.set_status("drag cancelled"),
                    _ => {}
                }
                self.dirty = true;
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let over_list = list_area.contains(ratatui::layout::Position::new(column, row));
                if self.engine.intercepts_wheel() || over_list {
                    let rows = if mouse.kind == MouseEventKind::ScrollUp {
                        -WHEEL_ROWS
                    } else {
                        WHEEL_ROWS
                    };
                    self.list.scroll_by(rows, now);
                    self.dirty = true;
                }
            }
            _ => {}
        }
    }

    /// Press on something that is not draggable
    fn click_control(&mut self, column: u16, row: u16) {
        let hits = &self.rendered.hits;
        let Some(target) = hits.target_at(column, row) else {
            return;
        };
        match hits.get(target).map(|region| region.role) {
            Some(RegionRole::ActionButton) => {
                let id = hits
                    .row_slot(target)
                    .and_then(|index| self.store.items().get(index))
                    .map(|item| item.id);
                if let Some(id) = id {
                    self.follow_item(id);
                    self.store.toggle_pin(id);
                }
            }
            Some(RegionRole::Scrollbar) => {
                let area = self.rendered.scrollbar_area;
                let len = self.store.len();
                if len > 0 && area.height > 0 {
                    let index = usize::from(row.saturating_sub(area.y)) * len
                        / usize::from(area.height);
                    self.list.scroll_to_index(index.min(len - 1), Align::Start);
                }
            }
            _ => {}
        }
        self.dirty = true;
    }
}
