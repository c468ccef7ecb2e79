// src/request.rs
//! Synthetic requests: [`MockRequest`], its form fields and attachments, the
//! multipart body synthesizer and the single-use body channels.

mod body;
mod fields;
mod multipart;
mod request;

pub use body::BodyChannel;
pub use body::BodyReader;
pub use body::BodyStream;

pub use fields::Attachment;
pub use fields::AttachmentStore;
pub use fields::FieldStore;

pub use multipart::MultipartBody;
pub use multipart::MULTIPART_BOUNDARY;
pub use multipart::MULTIPART_CONTENT_TYPE;

pub use request::MockRequest;
pub use request::FORM_URLENCODED;

pub(crate) use request::SharedLocation;
