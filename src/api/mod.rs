use rocket::Route;

mod common;
mod meeting;
mod votation;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(meeting::routes());
    routes.extend(votation::routes());
    routes.extend(voting::routes());
    routes
}
