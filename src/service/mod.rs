//! The poll's rules, layered over a [`Store`].
//!
//! Services hold nothing but a store handle, so they are cheap to build per
//! request: each one is a request guard that clones the managed [`Store`].

use rocket::{
    request::{self, FromRequest, Request},
    tokio::task,
    State,
};

use crate::error::Result;
use crate::store::{PollStore, Store};

mod question;
mod results;
mod vote;

pub use question::QuestionService;
pub use results::ResultsAggregator;
pub use vote::VoteService;

/// Make a service available as a request guard.
///
/// The request fails if no [`Store`] is managed by [`rocket::Rocket`].
macro_rules! service_guard {
    ($service:ident) => {
        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $service {
            type Error = ();

            async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
                req.guard::<&State<Store>>()
                    .await
                    .map(|store| $service::new(store.inner().clone()))
            }
        }
    };
}

service_guard!(QuestionService);
service_guard!(VoteService);
service_guard!(ResultsAggregator);

/// Run `f` against the store on the blocking thread pool, so file and SQLite
/// I/O never stalls the async workers.
async fn blocking<T, F>(store: &Store, f: F) -> Result<T>
where
    F: FnOnce(&dyn PollStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    task::spawn_blocking(move || f(&*store)).await?
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use crate::error::Error;

    use super::*;

    #[backend_test]
    async fn store_calls_leave_the_async_worker(store: Store) {
        let worker = std::thread::current().id();
        let (caller, questions) = blocking(&store, |store| {
            Ok((std::thread::current().id(), store.questions()?.len()))
        })
        .await
        .unwrap();
        assert_ne!(caller, worker);
        assert_eq!(questions, 3);
    }

    #[backend_test]
    async fn failed_store_task(store: Store) {
        let result: Result<()> = blocking(&store, |_| panic!("storage task died")).await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Task(_)));
        assert_eq!(err.status(), Status::InternalServerError);
    }
}
