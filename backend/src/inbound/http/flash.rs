//! Flash messages carried across redirects in the private session cookie.
//!
//! Messages attached to a redirect are stored in the cookie session and
//! removed again when the next page is rendered.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, Message};

pub(crate) const FLASH_KEY: &str = "wiking_flash";

/// Newtype over the Actix session exposing the flash operations only.
#[derive(Clone)]
pub struct FlashMessages(Session);

impl FlashMessages {
    /// Wrap the Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Remove and return the pending messages; undecodable ones are dropped.
    pub fn take(&self) -> Vec<Message> {
        let messages = match self.0.get::<Vec<Message>>(FLASH_KEY) {
            Ok(messages) => messages.unwrap_or_default(),
            Err(error) => {
                warn!(%error, "discarding undecodable flash messages");
                Vec::new()
            }
        };
        self.0.remove(FLASH_KEY);
        messages
    }

    /// Queue `messages` for the next page; nothing is stored when empty.
    ///
    /// # Errors
    /// Internal error when the session cannot be encoded.
    pub fn store(&self, messages: &[Message]) -> Result<(), Error> {
        if messages.is_empty() {
            return Ok(());
        }
        self.0
            .insert(FLASH_KEY, messages)
            .map_err(|error| Error::internal(format!("failed to store flash messages: {error}")))
    }
}

impl FromRequest for FlashMessages {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(FlashMessages::new) })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::MessageKind;
    use crate::inbound::http::test_utils::test_session_middleware;
    use actix_web::{App, HttpResponse, test, web};

    #[actix_web::test]
    async fn messages_survive_exactly_one_request() {
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .route(
                    "/store",
                    web::get().to(|flash: FlashMessages| async move {
                        flash.store(&[Message {
                            kind: MessageKind::Info,
                            text: "The record was deleted.".to_owned(),
                        }])?;
                        Ok::<_, Error>(HttpResponse::Ok().finish())
                    }),
                )
                .route(
                    "/take",
                    web::get().to(|flash: FlashMessages| async move {
                        let texts: Vec<String> =
                            flash.take().into_iter().map(|message| message.text).collect();
                        HttpResponse::Ok().body(texts.join("|"))
                    }),
                ),
        )
        .await;

        let stored =
            test::call_service(&app, test::TestRequest::get().uri("/store").to_request()).await;
        let cookie = stored
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        let first = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/take")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        let emptied = first
            .response()
            .cookies()
            .find(|c| c.name() == "session")
            .map(|c| c.into_owned());
        assert_eq!(test::read_body(first).await, "The record was deleted.");

        let mut second = test::TestRequest::get().uri("/take");
        if let Some(emptied) = emptied {
            second = second.cookie(emptied);
        }
        let second = test::call_service(&app, second.to_request()).await;
        assert_eq!(test::read_body(second).await, "");
    }
}
