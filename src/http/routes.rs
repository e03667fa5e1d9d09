use std::fmt::Display;

use super::{
    Method, Request, Response, METHOD_NOT_ALLOWED, NOT_FOUND, OK, SERVICE_UNAVAILABLE,
    UNPROCESSABLE_ENTITY,
};
use crate::animation::Animation;
use crate::color_store::ColorBuffer;
use crate::controller::Controller;
use crate::error::ControllerError;

/// Route one request to the controller
pub fn handle(controller: &Controller, request: &Request) -> Response {
    match (request.method, request.path.as_str()) {
        (Method::Post, "/color") => set_color(controller, &request.body),
        (Method::Get, "/color") => Response::json(OK, &controller.snapshot()),
        (Method::Post, "/anim") => play_animation(controller, &request.body),
        (_, "/color") | (_, "/anim") => Response::error(METHOD_NOT_ALLOWED, "method not allowed"),
        _ => Response::error(NOT_FOUND, "not found"),
    }
}

fn set_color(controller: &Controller, body: &[u8]) -> Response {
    let colors: ColorBuffer = match serde_json::from_slice(body) {
        Ok(colors) => colors,
        Err(e) => return reject(e),
    };

    outcome(controller.set_colors(colors))
}

fn play_animation(controller: &Controller, body: &[u8]) -> Response {
    let animation: Animation = match serde_json::from_slice(body) {
        Ok(animation) => animation,
        Err(e) => return reject(e),
    };

    outcome(controller.play_animation(animation))
}

fn outcome(result: Result<(), ControllerError>) -> Response {
    match result {
        Ok(()) => Response::empty(OK),
        Err(ControllerError::Validation(e)) => reject(e),
        Err(e) => {
            log::error!("Request failed: {}", e);
            Response::error(SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}

fn reject(e: impl Display) -> Response {
    log::warn!("Rejected request: {}", e);
    Response::error(UNPROCESSABLE_ENTITY, &e.to_string())
}
