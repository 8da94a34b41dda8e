//! Status bar and menu panel.

use super::interaction::MENU_BUTTON;
use super::{Frame, Layer, LayerContext, LayerError};
use crate::canvas::Rgba;
use crate::events::{topics, Event, SubscriptionSet};
use crate::geo::{ScreenPoint, ScreenRect};
use std::sync::Arc;

const Z_INDEX: i32 = 8;
const STATUS_BAR_HEIGHT: f32 = 30.0;
const PANEL: Rgba = Rgba::new(0x10, 0x10, 0x20, 0xe6);
const PANEL_BORDER: Rgba = Rgba::rgb(0x8b, 0x5c, 0xf6);
const TEXT: Rgba = Rgba::WHITE;
const ERROR_TEXT: Rgba = Rgba::rgb(0xff, 0x6b, 0x6b);

const MENU_TITLE: &str = "Eldritch Sanctuary";
const MENU_ITEMS: [&str; 5] = ["Resume Game", "Settings", "Inventory", "Quests", "Exit Game"];
const MENU_SIZE: f32 = 300.0;

/// Mirrors GPS status and errors into the store and draws them, and owns the
/// menu toggle.
#[derive(Debug, Default)]
pub struct UiLayer {
    subscriptions: Option<SubscriptionSet>,
}

impl UiLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for UiLayer {
    fn name(&self) -> &str {
        "ui"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn init(&mut self, ctx: &LayerContext) -> Result<(), LayerError> {
        let mut subscriptions = SubscriptionSet::new(ctx.bus.clone());

        let store = ctx.store.clone();
        subscriptions.on(topics::GPS_STATUS, move |event| {
            if let Event::GpsStatus(status) = event {
                let text = status.text();
                store.update("ui", |s| s.ui.status_text = text);
            }
        });

        let store = ctx.store.clone();
        subscriptions.on(topics::GPS_ERROR, move |event| {
            if let Event::GpsError(error) = event {
                let message = error.to_string();
                store.update("ui", |s| s.ui.last_error = Some(message));
            }
        });

        let store = ctx.store.clone();
        subscriptions.on(topics::GPS_SUCCESS, move |_| {
            store.update("ui", |s| s.ui.last_error = None);
        });

        let bus = Arc::downgrade(&ctx.bus);
        subscriptions.on(topics::UI_ELEMENT_CLICK, move |event| {
            if let Event::UiElementClick { element, .. } = event {
                if element == MENU_BUTTON {
                    if let Some(bus) = bus.upgrade() {
                        bus.emit(Event::UiMenuToggle);
                    }
                }
            }
        });

        let store = ctx.store.clone();
        subscriptions.on(topics::UI_MENU_TOGGLE, move |_| {
            let open = store.update("ui", |s| {
                s.ui.menu_open = !s.ui.menu_open;
                s.ui.menu_open
            });
            tracing::debug!(open, "Menu toggled");
        });

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let (status, error, menu_open) = frame.store.read(|s| {
            (
                s.ui.status_text.clone(),
                s.ui.last_error.clone(),
                s.ui.menu_open,
            )
        });
        let width = frame.canvas.width() as f32;
        let height = frame.canvas.height() as f32;

        let bar_y = height - STATUS_BAR_HEIGHT;
        frame.canvas.fill_rect(
            ScreenRect::new(0.0, bar_y, width, STATUS_BAR_HEIGHT),
            PANEL,
        );
        if !status.is_empty() {
            frame
                .canvas
                .label(ScreenPoint::new(10.0, bar_y + 12.0), &status, TEXT);
        }
        if let Some(error) = error {
            frame
                .canvas
                .label(ScreenPoint::new(width / 2.0, bar_y + 12.0), &error, ERROR_TEXT);
        }

        if menu_open {
            let panel = ScreenRect::new(
                width / 2.0 - MENU_SIZE / 2.0,
                height / 2.0 - MENU_SIZE / 2.0,
                MENU_SIZE,
                MENU_SIZE,
            );
            frame.canvas.fill_rect(panel, PANEL);
            frame.canvas.stroke_rect(panel, PANEL_BORDER, 2.0);
            frame.canvas.label(
                ScreenPoint::new(panel.x + 20.0, panel.y + 20.0),
                MENU_TITLE,
                PANEL_BORDER,
            );
            for (i, item) in MENU_ITEMS.iter().enumerate() {
                let y = panel.y + 70.0 + i as f32 * 40.0;
                frame
                    .canvas
                    .label(ScreenPoint::new(panel.x + 30.0, y), item, TEXT);
            }
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.subscriptions = None;
    }
}
