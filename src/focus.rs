/// Controls that can hold keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Focus {
    Trigger,
    Card(usize),
    ModalClose,
    ModalWatch,
}

/// Tab order outside the modal: the trigger, then every card in feed order,
/// wrapping at both ends.
pub fn next_in_page(current: Focus, card_count: usize, forward: bool) -> Focus {
    let len = card_count + 1;
    let position = match current {
        Focus::Card(index) if index < card_count => index + 1,
        _ => 0,
    };
    let next = if forward {
        (position + 1) % len
    } else {
        (position + len - 1) % len
    };
    match next {
        0 => Focus::Trigger,
        n => Focus::Card(n - 1),
    }
}
