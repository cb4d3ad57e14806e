pub mod profiles;
pub mod projects;
pub mod tags;

use actix_web::web;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/profiles").configure(profiles::create_routes))
        .service(web::scope("/projects").configure(projects::create_routes))
        .service(web::scope("/tags").configure(tags::create_routes));
}
