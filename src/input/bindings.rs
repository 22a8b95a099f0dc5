//! Logical action bindings
//!
//! Each [`Action`] owns one [`Binding`] mapping it to a physical index.
//! Button-class bindings index the normalizer's buttons; trigger-class
//! bindings index its trigger axes and compare against a threshold.
//!
//! Trigger bindings are hold-only: analog triggers have no debounced
//! edge, so [`BindingRegistry::resolve_just_pressed`] never reports them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::layout::*;
use super::normalize::Normalizer;

/// Default trigger threshold
pub const DEFAULT_TRIGGER_THRESHOLD: f32 = 0.5;

/// Binding category, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movement,
    Combat,
    Gameplay,
    Gui,
    Misc,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Movement,
            Category::Combat,
            Category::Gameplay,
            Category::Gui,
            Category::Misc,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movement => "movement",
            Category::Combat => "combat",
            Category::Gameplay => "gameplay",
            Category::Gui => "gui",
            Category::Misc => "misc",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical action a binding drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Jump,
    Sneak,
    Sprint,
    Attack,
    UseItem,
    Inventory,
    DropItem,
    HotbarNext,
    HotbarPrev,
    TogglePerspective,
    OpenChat,
    GuiSelect,
    GuiBack,
    Pause,
    PlayerList,
}

/// Declaration order, which is also registration and display order
const ALL_ACTIONS: [Action; Action::COUNT] = [
    Action::Jump,
    Action::Sneak,
    Action::Sprint,
    Action::Attack,
    Action::UseItem,
    Action::Inventory,
    Action::DropItem,
    Action::HotbarNext,
    Action::HotbarPrev,
    Action::TogglePerspective,
    Action::OpenChat,
    Action::GuiSelect,
    Action::GuiBack,
    Action::Pause,
    Action::PlayerList,
];

impl Action {
    pub const COUNT: usize = 15;

    /// All actions in registration order
    pub fn all() -> &'static [Action] {
        &ALL_ACTIONS
    }

    /// Position in the registry
    fn slot(self) -> usize {
        self as usize
    }

    /// Stable id used in the bindings file
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Jump => "jump",
            Action::Sneak => "sneak",
            Action::Sprint => "sprint",
            Action::Attack => "attack",
            Action::UseItem => "use_item",
            Action::Inventory => "inventory",
            Action::DropItem => "drop_item",
            Action::HotbarNext => "hotbar_next",
            Action::HotbarPrev => "hotbar_prev",
            Action::TogglePerspective => "toggle_perspective",
            Action::OpenChat => "open_chat",
            Action::GuiSelect => "gui_select",
            Action::GuiBack => "gui_back",
            Action::Pause => "pause",
            Action::PlayerList => "player_list",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown binding id: {}", s))
    }
}

/// One action → physical index mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    action: Action,
    translation_key: String,
    category: Category,
    default_index: i32,
    current_index: i32,
    is_trigger: bool,
    is_hold: bool,
}

impl Binding {
    fn new(action: Action, category: Category, default_index: i32, is_trigger: bool, is_hold: bool) -> Self {
        Self {
            action,
            translation_key: format!("padcursor.binding.{}", action.as_str()),
            category,
            default_index,
            current_index: default_index,
            is_trigger,
            is_hold,
        }
    }

    /// Default layout for `action`
    fn default_for(action: Action) -> Self {
        use Action::*;
        use Category::*;

        match action {
            Jump => Self::button(Jump, Movement, BUTTON_A, true),
            Sneak => Self::button(Sneak, Movement, BUTTON_B, true),
            Sprint => Self::button(Sprint, Movement, BUTTON_L3, true),
            Attack => Self::trigger(Attack, Combat, AXIS_TRIGGER_RIGHT),
            UseItem => Self::trigger(UseItem, Combat, AXIS_TRIGGER_LEFT),
            Inventory => Self::button(Inventory, Gameplay, BUTTON_Y, false),
            DropItem => Self::button(DropItem, Gameplay, BUTTON_DPAD_DOWN, true),
            HotbarNext => Self::button(HotbarNext, Gameplay, BUTTON_RB, false),
            HotbarPrev => Self::button(HotbarPrev, Gameplay, BUTTON_LB, false),
            TogglePerspective => Self::button(TogglePerspective, Gameplay, BUTTON_DPAD_UP, false),
            OpenChat => Self::button(OpenChat, Gameplay, BUTTON_DPAD_RIGHT, false),
            GuiSelect => Self::button(GuiSelect, Gui, BUTTON_A, false),
            GuiBack => Self::button(GuiBack, Gui, BUTTON_B, false),
            Pause => Self::button(Pause, Misc, BUTTON_START, false),
            PlayerList => Self::button(PlayerList, Misc, BUTTON_BACK, true),
        }
    }

    fn button(action: Action, category: Category, default_index: i32, is_hold: bool) -> Self {
        Self::new(action, category, default_index, false, is_hold)
    }

    fn trigger(action: Action, category: Category, default_axis: i32) -> Self {
        Self::new(action, category, default_axis, true, true)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn id(&self) -> &'static str {
        self.action.as_str()
    }

    pub fn translation_key(&self) -> &str {
        &self.translation_key
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn default_index(&self) -> i32 {
        self.default_index
    }

    pub fn index(&self) -> i32 {
        self.current_index
    }

    pub fn is_trigger(&self) -> bool {
        self.is_trigger
    }

    /// Hold-class bindings are polled as held; the rest fire on press
    pub fn is_hold(&self) -> bool {
        self.is_hold
    }

    pub fn is_modified(&self) -> bool {
        self.current_index != self.default_index
    }

    pub fn is_unbound(&self) -> bool {
        self.current_index == UNBOUND
    }

    /// Display name of the current physical index
    pub fn index_name(&self) -> &'static str {
        button_name(self.current_index, self.is_trigger)
    }
}

/// The process-wide set of bindings, in registration order
///
/// One binding per [`Action`], stored at the action's position.
#[derive(Debug, Clone)]
pub struct BindingRegistry {
    bindings: [Binding; Action::COUNT],
    trigger_threshold: f32,
}

impl BindingRegistry {
    /// Registry populated with the default layout
    pub fn new() -> Self {
        Self {
            bindings: ALL_ACTIONS.map(Binding::default_for),
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
        }
    }

    pub fn with_trigger_threshold(mut self, threshold: f32) -> Self {
        self.trigger_threshold = threshold;
        self
    }

    pub fn trigger_threshold(&self) -> f32 {
        self.trigger_threshold
    }

    pub fn set_trigger_threshold(&mut self, threshold: f32) {
        self.trigger_threshold = threshold;
    }

    pub fn get(&self, action: Action) -> &Binding {
        &self.bindings[action.slot()]
    }

    /// Look up by the stable string id (bindings file keys)
    pub fn get_by_id(&self, id: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id() == id)
    }

    fn get_mut(&mut self, action: Action) -> &mut Binding {
        &mut self.bindings[action.slot()]
    }

    pub fn all(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |b| b.category == category)
    }

    pub fn categories(&self) -> &'static [Category] {
        Category::all()
    }

    /// Is the action held this frame?
    ///
    /// Unbound bindings never match. Trigger bindings compare their axis
    /// against the threshold; button bindings read the current frame.
    pub fn resolve(&self, action: Action, input: &Normalizer) -> bool {
        let binding = self.get(action);
        if binding.is_unbound() {
            return false;
        }

        if binding.is_trigger {
            input.axis(binding.current_index) > self.trigger_threshold
        } else {
            input.is_pressed(binding.current_index)
        }
    }

    /// Did the action go down this frame?
    ///
    /// Always false for trigger bindings: they are hold-only.
    pub fn resolve_just_pressed(&self, action: Action, input: &Normalizer) -> bool {
        let binding = self.get(action);
        if binding.is_unbound() || binding.is_trigger {
            return false;
        }

        input.is_just_pressed(binding.current_index)
    }

    /// Point an action at a new physical index
    ///
    /// Unconditional: conflicts are not resolved here, call
    /// [`Self::find_conflict`] first. Pass [`UNBOUND`] to unbind.
    pub fn rebind(&mut self, action: Action, physical_index: i32) {
        let binding = self.get_mut(action);
        debug!(
            "Rebinding {} from {} to {}",
            action,
            binding.index_name(),
            button_name(physical_index, binding.is_trigger)
        );
        binding.current_index = physical_index;
    }

    pub fn unbind(&mut self, action: Action) {
        self.rebind(action, UNBOUND);
    }

    pub fn reset(&mut self, action: Action) {
        let binding = self.get_mut(action);
        binding.current_index = binding.default_index;
    }

    /// Restore every binding to its default index
    pub fn reset_all(&mut self) {
        for binding in self.bindings.iter_mut() {
            binding.current_index = binding.default_index;
        }
    }

    /// First other binding already using `physical_index`
    ///
    /// Only bindings of the same input class as `excluding` are compared:
    /// trigger bindings live in axis space, button bindings in button space.
    /// This is narrower than comparing the bare index, which would report
    /// button 5 (Guide) as taken by the attack trigger on axis 5.
    /// Unbound never conflicts.
    pub fn find_conflict(&self, physical_index: i32, excluding: Action) -> Option<&Binding> {
        if physical_index == UNBOUND {
            return None;
        }

        let is_trigger = self.get(excluding).is_trigger;
        self.bindings.iter().find(|b| {
            b.action != excluding && b.is_trigger == is_trigger && b.current_index == physical_index
        })
    }

    pub fn modified(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.is_modified())
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
