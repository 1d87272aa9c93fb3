use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, Identity};

use super::components::{
    chat_area, input_bar,
    sidebar::{self, SidebarActions},
};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        identity: Identity,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: AppState::new(identity),
            command_sender,
            event_receiver,
        }
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event);
        }
    }

    fn send_command(&mut self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat worker: {err}");
            self.state.pending_send = None;
            self.state
                .set_status(format!("Chat worker unavailable: {err}"), true);
        }
    }

    fn title(&self) -> String {
        if self.state.identity.is_admin {
            match &self.state.selected {
                Some(selected) => {
                    let label = self
                        .state
                        .counterparts
                        .iter()
                        .find(|c| &c.identity == selected)
                        .map(|c| c.label.as_str())
                        .unwrap_or(selected.as_str());
                    format!("Chat with {label}")
                }
                None => "Select a conversation".to_string(),
            }
        } else {
            "Chat with Admin".to_string()
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        if self.state.identity.is_admin {
            egui::SidePanel::left("conversation_sidebar")
                .resizable(true)
                .default_width(220.0)
                .show(ctx, |ui| {
                    let actions: SidebarActions = sidebar::render(ui, &mut self.state);
                    if let Some(counterpart) = actions.select {
                        self.send_command(ChatCommand::SelectConversation(counterpart));
                    }
                    if actions.mark_all_read {
                        self.send_command(ChatCommand::MarkAllRead);
                    }
                });
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            match &self.state.status {
                Some(status) => {
                    let color = if status.is_error {
                        egui::Color32::LIGHT_RED
                    } else {
                        egui::Color32::GRAY
                    };
                    ui.colored_label(
                        color,
                        format!("[{}] {}", status.timestamp.format("%H:%M:%S"), status.message),
                    );
                }
                None => {
                    ui.label(egui::RichText::new(format!("Signed in as {}", self.state.identity.id)).weak());
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(self.title());
            ui.separator();
            chat_area::render(ui, &mut self.state);

            ui.separator();
            let can_send = !self.state.identity.is_admin || self.state.selected.is_some();
            if input_bar::render(ui, &mut self.state.input_text, can_send) {
                if let Some(text) = self.state.take_outgoing() {
                    self.send_command(ChatCommand::SendMessage(text));
                }
            }
        });

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
