/// Limits of a messenger implementation; replies longer than
/// `max_message_len` are split before sending.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

/// Inline keyboard (buttons) used for the registration approval prompt.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    pub fn single(label: &str, callback_data: String) -> Self {
        Self {
            buttons: vec![InlineButton {
                label: label.to_string(),
                callback_data,
            }],
        }
    }
}
