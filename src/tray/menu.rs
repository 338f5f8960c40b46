//! Tray context menu model, independent of the GUI backend.

#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

/// Actions that can be triggered from the tray menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub enabled: bool,
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn header(label: String) -> Self {
        Self {
            label,
            enabled: false,
            action: None,
        }
    }

    fn separator() -> Self {
        Self::header(String::new())
    }

    /// Separators are disabled items with no label
    pub fn is_separator(&self) -> bool {
        self.label.is_empty() && !self.enabled && self.action.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct MenuState {
    pub app_name: String,
    pub running: bool,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            app_name: "Nowcast".into(),
            running: true,
        }
    }
}

impl MenuState {
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let status = if self.running { "Running" } else { "Stopped" };

        vec![
            MenuItem::header(format!("{} — {status}", self.app_name)),
            MenuItem::separator(),
            MenuItem {
                label: "Quit".into(),
                enabled: true,
                action: Some(MenuAction::Quit),
            },
        ]
    }
}
