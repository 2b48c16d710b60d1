use http::status::StatusCode;
use leptos::*;
use thiserror::Error;

use crate::query::QueryError;

#[derive(Clone, Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,
    #[error("Query failed: {0}")]
    Query(#[from] QueryError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Query(QueryError::InvalidKey { .. }) => StatusCode::BAD_REQUEST,
            AppError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders the errors collected by an `ErrorBoundary` or handed over by the router.
///
/// On the server the response status is set from the first error.
#[component]
pub fn ErrorTemplate(
    #[prop(optional)] outside_errors: Option<Errors>,
    #[prop(optional)] errors: Option<RwSignal<Errors>>,
) -> impl IntoView {
    let errors = match outside_errors {
        Some(e) => create_rw_signal(e),
        None => errors.unwrap_or_else(|| create_rw_signal(Errors::default())),
    };

    // Get Errors from Signal
    let errors: Vec<AppError> = errors
        .get_untracked()
        .into_iter()
        .filter_map(|(_, error)| {
            error
                .downcast_ref::<AppError>()
                .cloned()
                .or_else(|| error.downcast_ref::<QueryError>().cloned().map(AppError::from))
        })
        .collect();

    #[cfg(feature = "ssr")]
    {
        use leptos_axum::ResponseOptions;
        if let (Some(response), Some(error)) = (use_context::<ResponseOptions>(), errors.first()) {
            response.set_status(error.status_code());
        }
    }

    view! {
        <h1>{if errors.len() > 1 { "Errors" } else { "Error" }}</h1>
        <For
            each=move || { errors.clone().into_iter().enumerate() }
            key=|(index, _)| *index
            children=move |(_, error)| {
                let error_string = error.to_string();
                let error_code = error.status_code();
                view! {
                    <h2>{error_code.to_string()}</h2>
                    <p>"Error: " {error_string}</p>
                }
            }
        />
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(QueryError::Request("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(QueryError::InvalidKey {
                key: "[]".into(),
                index: 0
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
