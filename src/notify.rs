//! Typed notifications from the canvas to whoever orchestrates it.

use std::fmt;

use crate::input::InputSnapshot;

/// The three render layers, each with its own opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Image,
    Prediction,
    UserInput,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [LayerKind::Image, LayerKind::Prediction, LayerKind::UserInput];
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Image => "image",
            LayerKind::Prediction => "prediction",
            LayerKind::UserInput => "user input",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ImageLoaded {
        filename: Option<String>,
        width: u32,
        height: u32,
    },
    /// A gesture changed the prompt set.
    InputsChanged(InputSnapshot),
    InputsCleared,
    OpacityChanged {
        layer: LayerKind,
        opacity: f32,
    },
    Error {
        message: String,
    },
    LayerSelectionChanged {
        layer_ids: Vec<String>,
    },
    ZoomPanChanged {
        scale: f32,
        pan_x: f32,
        pan_y: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Notification)>;

/// Listener registry. Listeners run synchronously, in subscription order.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, notification: &Notification) {
        for (_, listener) in &mut self.listeners {
            listener(notification);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_reaches_all_listeners_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut n = Notifier::new();
        for tag in ["a", "b"] {
            let seen = Rc::clone(&seen);
            n.subscribe(move |_| seen.borrow_mut().push(tag));
        }
        n.emit(&Notification::InputsCleared);
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut n = Notifier::new();
        let c = Rc::clone(&count);
        let id = n.subscribe(move |_| *c.borrow_mut() += 1);
        n.emit(&Notification::InputsCleared);
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        n.emit(&Notification::InputsCleared);
        assert_eq!(*count.borrow(), 1);
        assert!(n.is_empty());
    }

    #[test]
    fn test_layer_kind_display() {
        assert_eq!(LayerKind::UserInput.to_string(), "user input");
    }
}
