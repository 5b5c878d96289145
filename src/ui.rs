//! The controls window.

use glam::Vec4;

use crate::params::{Controls, ParticleTier};

pub const WINDOW_TITLE: &str = "Compute Shader - Particles";

/// Draw the controls window and apply any edits to `controls`.
///
/// Returns true if a value changed this frame.
pub fn controls_window(ctx: &egui::Context, controls: &mut Controls) -> bool {
    let mut changed = false;

    egui::Window::new(WINDOW_TITLE).resizable(false).show(ctx, |ui| {
        ui.label("• Left click/hold to attract particles");
        ui.label("• Right click/hold to repulse particles");
        ui.separator();

        let mut millions = controls.tier.get();
        if ui
            .add(
                egui::Slider::new(&mut millions, ParticleTier::MIN..=ParticleTier::MAX)
                    .text("Million particles"),
            )
            .changed()
        {
            controls.tier = ParticleTier::new(millions);
            changed = true;
        }

        ui.horizontal(|ui| {
            let mut rgba = controls.color.to_array();
            if ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed() {
                controls.color = Vec4::from_array(rgba);
                changed = true;
            }
            ui.label("Color");
        });
    });

    changed
}
