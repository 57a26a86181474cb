//! Overlay rendering of detection results.

use crate::{
    detection::DetectedObject,
    gesture,
    image::{draw, Color, Image, Rect},
    landmark::{Hand, LandmarkIdx},
};

/// Radius of the dot drawn for every hand landmark, in pixels.
pub const LANDMARK_RADIUS: f32 = 5.0;

/// Distance between a hand's gesture label and its wrist landmark, in pixels.
pub const GESTURE_LABEL_OFFSET: f32 = 10.0;

const LANDMARK_COLOR: Color = Color::RED;
const GESTURE_COLOR: Color = Color::YELLOW;

const PALETTE: [Color; 6] = [
    Color::GREEN,
    Color::CYAN,
    Color::MAGENTA,
    Color::YELLOW,
    Color::BLUE,
    Color::from_rgb8(255, 128, 0),
];

/// A resizable 2D drawing surface.
///
/// Coordinates are in pixels, with the origin in the top left corner.
pub trait Canvas {
    /// Resizes the canvas to `width` x `height` pixels and clears it to full transparency.
    fn resize(&mut self, width: u32, height: u32);

    /// Draws the outline of `rect`.
    fn stroke_rect(&mut self, rect: Rect, color: Color);

    /// Draws a filled circle centered at `(x, y)`.
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color);

    /// Draws `text` with its bottom left corner at `(x, y)`.
    fn fill_text(&mut self, x: f32, y: f32, text: &str, color: Color);
}

impl Canvas for Image {
    fn resize(&mut self, width: u32, height: u32) {
        self.resize_and_clear(width, height);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) {
        draw::rect(self, rect).color(color).stroke_width(2);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        let diameter = (radius * 2.0).round() as u32;
        draw::filled_circle(self, x.round() as i32, y.round() as i32, diameter).color(color);
    }

    fn fill_text(&mut self, x: f32, y: f32, text: &str, color: Color) {
        draw::text(self, x.round() as i32, y.round() as i32, text)
            .align_left()
            .align_bottom()
            .color(color);
    }
}

/// Returns the color used for objects labeled `label`.
///
/// The same label always gets the same color.
pub fn label_color(label: &str) -> Color {
    // FNV-1a
    let hash = label
        .bytes()
        .fold(0x811c9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x01000193));
    PALETTE[hash as usize % PALETTE.len()]
}

/// Draws detected objects and hands onto `canvas`.
///
/// Every object gets its bounding box and a caption with its label and confidence. Every hand gets
/// a dot per landmark and a label with its gesture, placed above the wrist. Nothing is drawn for
/// empty inputs.
pub fn render<C: Canvas + ?Sized>(canvas: &mut C, objects: &[DetectedObject], hands: &[Hand]) {
    for object in objects {
        let rect = object.bounding_box();
        let color = label_color(object.label());
        canvas.stroke_rect(rect, color);

        let caption = format!("{} {:.0}%", object.label(), object.confidence() * 100.0);
        canvas.fill_text(rect.x(), rect.y(), &caption, color);
    }

    for hand in hands {
        for landmark in hand.landmarks() {
            canvas.fill_circle(landmark.x(), landmark.y(), LANDMARK_RADIUS, LANDMARK_COLOR);
        }

        let wrist = hand.landmark(LandmarkIdx::Wrist);
        let gesture = gesture::classify(hand);
        canvas.fill_text(
            wrist.x(),
            wrist.y() - GESTURE_LABEL_OFFSET,
            gesture.caption(),
            GESTURE_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Landmark;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Resize(u32, u32),
        Rect(Rect),
        Circle(f32, f32, f32),
        Text(f32, f32, String),
    }

    #[derive(Default)]
    struct Recorder(Vec<Call>);

    impl Canvas for Recorder {
        fn resize(&mut self, width: u32, height: u32) {
            self.0.push(Call::Resize(width, height));
        }

        fn stroke_rect(&mut self, rect: Rect, _: Color) {
            self.0.push(Call::Rect(rect));
        }

        fn fill_circle(&mut self, x: f32, y: f32, radius: f32, _: Color) {
            self.0.push(Call::Circle(x, y, radius));
        }

        fn fill_text(&mut self, x: f32, y: f32, text: &str, _: Color) {
            self.0.push(Call::Text(x, y, text.to_string()));
        }
    }

    impl Recorder {
        fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
            self.0.iter().filter(|c| f(c)).count()
        }
    }

    fn hand_at(x: f32, y: f32) -> Hand {
        let positions = (0..21)
            .map(|i| [x + i as f32, y + i as f32, 0.0])
            .collect::<Vec<_>>();
        Hand::from_positions(&positions).unwrap()
    }

    #[test]
    fn empty_input_draws_nothing() {
        let mut canvas = Recorder::default();
        render(&mut canvas, &[], &[]);
        assert!(canvas.0.is_empty());
    }

    #[test]
    fn draw_call_counts() {
        let objects = vec![
            DetectedObject::new("cup", Rect::from_top_left(10.0, 20.0, 30.0, 40.0), 0.87),
            DetectedObject::new("person", Rect::from_top_left(0.0, 0.0, 5.0, 5.0), 0.5),
        ];
        let hands = vec![hand_at(100.0, 100.0), hand_at(200.0, 50.0), hand_at(0.0, 0.0)];

        let mut canvas = Recorder::default();
        render(&mut canvas, &objects, &hands);

        assert_eq!(canvas.count(|c| matches!(c, Call::Rect(_))), 2);
        assert_eq!(canvas.count(|c| matches!(c, Call::Circle(..))), 21 * 3);
        assert_eq!(canvas.count(|c| matches!(c, Call::Text(..))), 2 + 3);
        assert_eq!(canvas.count(|c| matches!(c, Call::Resize(..))), 0);
    }

    #[test]
    fn object_caption() {
        let rect = Rect::from_top_left(10.0, 20.0, 30.0, 40.0);
        let mut canvas = Recorder::default();
        render(&mut canvas, &[DetectedObject::new("cup", rect, 0.87)], &[]);
        assert_eq!(
            canvas.0,
            [Call::Rect(rect), Call::Text(10.0, 20.0, "cup 87%".into())]
        );
    }

    #[test]
    fn hand_label_above_wrist() {
        let mut canvas = Recorder::default();
        render(&mut canvas, &[], &[hand_at(100.0, 60.0)]);

        assert_eq!(canvas.0[0], Call::Circle(100.0, 60.0, LANDMARK_RADIUS));
        assert_eq!(canvas.0[20], Call::Circle(120.0, 80.0, LANDMARK_RADIUS));
        // This hand shows no recognized gesture, so the label is empty.
        assert_eq!(canvas.0[21], Call::Text(100.0, 50.0, String::new()));
        assert_eq!(canvas.0.len(), 22);
    }

    #[test]
    fn hand_label_shows_gesture() {
        let mut landmarks = [Landmark::default(); Hand::NUM_LANDMARKS];
        landmarks[LandmarkIdx::IndexFingerTip as usize] = Landmark::new([0.0, 10.0, -0.4]);
        landmarks[LandmarkIdx::MiddleFingerTip as usize] = Landmark::new([0.0, 0.0, -0.3]);
        landmarks[LandmarkIdx::RingFingerTip as usize] = Landmark::new([0.0, 0.0, -0.2]);
        landmarks[LandmarkIdx::PinkyTip as usize] = Landmark::new([0.0, 0.0, -0.1]);
        let hand = Hand::new(landmarks);

        let mut canvas = Recorder::default();
        render(&mut canvas, &[], &[hand]);
        assert_eq!(
            canvas.0.last(),
            Some(&Call::Text(0.0, -10.0, "fingers_splayed".into()))
        );
    }

    #[test]
    fn label_colors_are_stable() {
        assert_eq!(label_color("cup"), label_color("cup"));
        assert_eq!(label_color("person"), label_color(&String::from("person")));
    }

    #[test]
    fn image_canvas() {
        let mut image = Image::new(1, 1);
        image.resize(40, 30);
        assert_eq!((image.width(), image.height()), (40, 30));

        image.fill_circle(20.0, 15.0, LANDMARK_RADIUS, Color::RED);
        assert_eq!(image.get(20, 15), Color::RED);
        assert_eq!(image.get(0, 0), Color::NULL);

        image.resize(40, 30);
        assert_eq!(image.get(20, 15), Color::NULL);
    }
}
