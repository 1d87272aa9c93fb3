use crate::ui::state::AppState;
use eframe::egui;

#[derive(Default)]
pub struct SidebarActions {
    pub select: Option<String>,
    pub mark_all_read: bool,
}

pub fn render(ui: &mut egui::Ui, state: &mut AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.heading("Conversations");
    ui.horizontal(|ui| {
        let color = if state.unread > 0 {
            egui::Color32::LIGHT_RED
        } else {
            egui::Color32::GRAY
        };
        ui.colored_label(color, format!("● {} unread", state.unread));
        if state.unread > 0 && ui.small_button("Mark all read").clicked() {
            actions.mark_all_read = true;
        }
    });
    ui.separator();

    if state.counterparts.is_empty() {
        ui.label("No conversations yet");
        return actions;
    }

    let mut clicked = None;
    for counterpart in &state.counterparts {
        let selected = state.selected.as_deref() == Some(counterpart.identity.as_str());
        if ui.selectable_label(selected, counterpart.label.as_str()).clicked() {
            clicked = Some(counterpart.identity.clone());
        }
    }

    if let Some(identity) = clicked {
        actions.select = state.select(&identity);
    }

    actions
}
