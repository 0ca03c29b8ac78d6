//! Modal and toast host
//!
//! The session components talk to the UI through [`YewModalPresenter`] and
//! [`YewNotifier`]. Both forward to whichever [`SessionUiHost`] is mounted; with
//! no host mounted the modal reports itself unavailable and the failure
//! handler falls back to redirects.

use gloo::timers::callback::Timeout;
use keeper_core::{ModalDialog, ModalPresenter, Notifier, ToastLevel};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use yew::prelude::*;

const TOAST_DURATION_MS: u32 = 5_000;

thread_local! {
    /// Callback of the mounted host
    static UI_HOST: RefCell<Option<Callback<UiCommand>>> = const { RefCell::new(None) };
}

fn set_host(callback: Callback<UiCommand>) {
    UI_HOST.with(|host| {
        *host.borrow_mut() = Some(callback);
    });
}

fn clear_host() {
    UI_HOST.with(|host| {
        *host.borrow_mut() = None;
    });
}

fn host_mounted() -> bool {
    UI_HOST.with(|host| host.borrow().is_some())
}

/// Send a command to the mounted host. Returns false when none is mounted.
fn emit(command: UiCommand) -> bool {
    let callback = UI_HOST.with(|host| host.borrow().clone());
    match callback {
        Some(callback) => {
            callback.emit(command);
            true
        }
        None => false,
    }
}

enum UiCommand {
    Open(Rc<OpenDialog>),
    Close,
    Toast(Toast),
}

/// A dialog on screen; each button answer is delivered at most once
struct OpenDialog {
    title: String,
    message: String,
    confirm_label: String,
    cancel_label: String,
    answers: RefCell<Option<(Box<dyn FnOnce()>, Box<dyn FnOnce()>)>>,
}

impl OpenDialog {
    fn answer(&self, confirmed: bool) {
        let answers = self.answers.borrow_mut().take();
        if let Some((on_confirm, on_cancel)) = answers {
            if confirmed { on_confirm() } else { on_cancel() }
        }
    }
}

impl From<ModalDialog> for OpenDialog {
    fn from(dialog: ModalDialog) -> Self {
        Self {
            title: dialog.title,
            message: dialog.message,
            confirm_label: dialog.confirm_label,
            cancel_label: dialog.cancel_label,
            answers: RefCell::new(Some((dialog.on_confirm, dialog.on_cancel))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Toast {
    id: u64,
    level: ToastLevel,
    message: String,
}

/// Modal presenter backed by the mounted [`SessionUiHost`]
#[derive(Debug, Clone, Copy, Default)]
pub struct YewModalPresenter;

impl ModalPresenter for YewModalPresenter {
    fn is_available(&self) -> bool {
        host_mounted()
    }

    fn open(&self, dialog: ModalDialog) {
        if !emit(UiCommand::Open(Rc::new(dialog.into()))) {
            tracing::warn!("modal requested with no host mounted");
        }
    }

    fn close(&self) {
        emit(UiCommand::Close);
    }
}

/// Toast notifier backed by the mounted [`SessionUiHost`]
#[derive(Debug, Default)]
pub struct YewNotifier {
    next_id: Cell<u64>,
}

impl Notifier for YewNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let toast = Toast {
            id,
            level,
            message: message.to_string(),
        };
        if !emit(UiCommand::Toast(toast)) {
            tracing::info!(?level, message, "toast dropped, no host mounted");
        }
    }
}

#[derive(Default)]
struct HostState {
    dialog: Option<Rc<OpenDialog>>,
    toasts: Vec<Toast>,
}

enum HostAction {
    Command(UiCommand),
    Dismiss(u64),
}

impl Reducible for HostState {
    type Action = HostAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut dialog = self.dialog.clone();
        let mut toasts = self.toasts.clone();
        match action {
            HostAction::Command(UiCommand::Open(open)) => dialog = Some(open),
            HostAction::Command(UiCommand::Close) => dialog = None,
            HostAction::Command(UiCommand::Toast(toast)) => toasts.push(toast),
            HostAction::Dismiss(id) => toasts.retain(|toast| toast.id != id),
        }
        Rc::new(Self { dialog, toasts })
    }
}

/// Renders the session modal and toasts. Mount once near the app root.
#[function_component(SessionUiHost)]
pub fn session_ui_host() -> Html {
    let state = use_reducer(HostState::default);

    {
        let dispatcher = state.dispatcher();
        use_effect_with((), move |()| {
            set_host(Callback::from(move |command: UiCommand| {
                if let UiCommand::Toast(toast) = &command {
                    let dispatcher = dispatcher.clone();
                    let id = toast.id;
                    Timeout::new(TOAST_DURATION_MS, move || {
                        dispatcher.dispatch(HostAction::Dismiss(id));
                    })
                    .forget();
                }
                dispatcher.dispatch(HostAction::Command(command));
            }));
            clear_host
        });
    }

    let modal = state.dialog.as_ref().map(|dialog| {
        let on_confirm = {
            let dialog = Rc::clone(dialog);
            Callback::from(move |e: MouseEvent| {
                e.prevent_default();
                dialog.answer(true);
            })
        };
        let on_cancel = {
            let dialog = Rc::clone(dialog);
            Callback::from(move |e: MouseEvent| {
                e.prevent_default();
                dialog.answer(false);
            })
        };

        html! {
            <div class="fixed inset-0 bg-black bg-opacity-50 flex items-center justify-center z-50"
                 role="dialog" aria-modal="true">
                <div class="bg-white dark:bg-gray-800 rounded-lg p-6 max-w-md w-full mx-4 shadow-xl">
                    <h2 class="text-xl font-bold text-gray-900 dark:text-white mb-4">
                        { dialog.title.clone() }
                    </h2>
                    <p class="text-gray-600 dark:text-gray-300 mb-6">
                        { dialog.message.clone() }
                    </p>
                    <div class="flex gap-3">
                        <button
                            onclick={on_confirm}
                            class="flex-1 bg-blue-600 hover:bg-blue-700 text-white font-medium py-2 px-4 rounded-lg"
                        >
                            { dialog.confirm_label.clone() }
                        </button>
                        <button
                            onclick={on_cancel}
                            class="flex-1 bg-gray-200 hover:bg-gray-300 dark:bg-gray-700 text-gray-900 dark:text-white font-medium py-2 px-4 rounded-lg"
                        >
                            { dialog.cancel_label.clone() }
                        </button>
                    </div>
                </div>
            </div>
        }
    });

    html! {
        <>
            { for modal }
            <div class="fixed bottom-4 right-4 flex flex-col gap-2 z-50">
                { for state.toasts.iter().map(toast_view) }
            </div>
        </>
    }
}

fn toast_view(toast: &Toast) -> Html {
    let palette = match toast.level {
        ToastLevel::Info => "bg-blue-50 text-blue-800 dark:bg-blue-900/30 dark:text-blue-200",
        ToastLevel::Success => "bg-green-50 text-green-800 dark:bg-green-900/30 dark:text-green-200",
        ToastLevel::Warning => "bg-yellow-50 text-yellow-800 dark:bg-yellow-900/30 dark:text-yellow-200",
        ToastLevel::Error => "bg-red-50 text-red-700 dark:bg-red-900/30 dark:text-red-300",
    };
    html! {
        <div key={toast.id} class={classes!("p-3", "rounded", "shadow", "text-sm", palette)} role="status">
            { toast.message.clone() }
        </div>
    }
}
