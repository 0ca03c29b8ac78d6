//! Yew context carrying the tab's session

use keeper_core::Session;
use std::rc::Rc;
use yew::prelude::*;

use crate::ui::SessionUiHost;

/// Shared handle to the tab's session; equal only to itself
#[derive(Clone)]
pub struct SessionHandle(pub Rc<Session>);

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for SessionHandle {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Properties, PartialEq)]
pub struct SessionProviderProps {
    pub session: SessionHandle,
    pub children: Children,
}

/// Provides the session to descendants and mounts the modal/toast host
#[function_component(SessionProvider)]
pub fn session_provider(props: &SessionProviderProps) -> Html {
    html! {
        <ContextProvider<SessionHandle> context={props.session.clone()}>
            { props.children.clone() }
            <SessionUiHost />
        </ContextProvider<SessionHandle>>
    }
}

/// The session provided by the nearest [`SessionProvider`]
#[hook]
pub fn use_session() -> Option<SessionHandle> {
    use_context::<SessionHandle>()
}
