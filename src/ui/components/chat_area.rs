use eframe::egui;

use crate::ui::state::{AppState, format_time};

pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    let scroll = std::mem::take(&mut state.scroll_to_latest);

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .max_height(ui.available_height() - 40.0)
        .show(ui, |ui| {
            if state.is_loading() {
                ui.spinner();
            } else if state.messages.is_empty() {
                ui.label(egui::RichText::new("No messages yet").weak());
            }

            for message in &state.messages {
                // Tin nhắn của mình căn phải, của người kia căn trái
                let layout = if state.is_own(message) {
                    egui::Layout::right_to_left(egui::Align::TOP)
                } else {
                    egui::Layout::left_to_right(egui::Align::TOP)
                };
                ui.with_layout(layout, |ui| {
                    let color = if state.is_own(message) {
                        egui::Color32::LIGHT_BLUE
                    } else {
                        egui::Color32::LIGHT_GRAY
                    };
                    ui.colored_label(color, message.text.as_str());
                    ui.label(
                        egui::RichText::new(format_time(message.created_at))
                            .small()
                            .weak(),
                    );
                });
            }

            if scroll {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });
}
