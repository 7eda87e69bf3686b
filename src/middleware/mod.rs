pub mod csrf;
pub mod security_headers;

pub use csrf::{
    form_token, generate_csrf_token, get_or_create_csrf_token, validate_csrf_form_field,
    CsrfToken, CSRF_TOKEN_KEY,
};
pub use security_headers::add_security_headers;
