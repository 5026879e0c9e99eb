use barsync::core::clock::ManualClock;
use barsync::core::input::{InputEdge, Lane, input_channel};
use barsync::game::chart::LaneGroup;
use barsync::game::gameplay::{NullSink, PresentationSink, Session, SessionConfig, SessionPhase, SessionSink};
use barsync::game::judgment::{JudgeGrade, JudgeSource, Judgment};
use barsync::game::note::{NoteState, NoteView};
use barsync::game::parsing::chart_text::parse_chart;
use barsync::game::pool::{NoteHandle, TimelineHandle};
use barsync::game::scores::{ClearRank, ScoreEvent};
use barsync::game::stage_stats::StageSummary;
use barsync::game::timeline::{TimelinePhase, TimelineView};

// Every chart here runs at 120 bpm: 2s bars, bar 1 starts at 2.0s.
const BPM: u32 = 120;

fn lane(n: u8) -> Lane {
    Lane::new(n).unwrap()
}

#[derive(Default)]
struct Recorder {
    judged: Vec<(Judgment, ScoreEvent)>,
    missed: Vec<(Judgment, ScoreEvent)>,
    finished: Vec<StageSummary>,
}

impl SessionSink for Recorder {
    fn on_judged(&mut self, judgment: &Judgment, event: &ScoreEvent) {
        self.judged.push((judgment.clone(), *event));
    }
    fn on_missed(&mut self, judgment: &Judgment, event: &ScoreEvent) {
        self.missed.push((judgment.clone(), *event));
    }
    fn on_game_finished(&mut self, summary: &StageSummary) {
        self.finished.push(summary.clone());
    }
}

#[derive(Default)]
struct Screen {
    notes_moved: Vec<(NoteHandle, NoteView)>,
    notes_removed: Vec<NoteHandle>,
    lines_moved: Vec<(TimelineHandle, TimelineView)>,
    lines_removed: Vec<TimelineHandle>,
}

impl PresentationSink for Screen {
    fn note_moved(&mut self, handle: NoteHandle, view: NoteView) {
        self.notes_moved.push((handle, view));
    }
    fn note_removed(&mut self, handle: NoteHandle) {
        self.notes_removed.push(handle);
    }
    fn timeline_moved(&mut self, handle: TimelineHandle, view: TimelineView) {
        self.lines_moved.push((handle, view));
    }
    fn timeline_removed(&mut self, handle: TimelineHandle) {
        self.lines_removed.push(handle);
    }
}

fn recorded(text: &str) -> Session<ManualClock, Recorder, NullSink> {
    let chart = parse_chart(text, BPM).chart;
    Session::new(
        &chart,
        SessionConfig::default(),
        ManualClock::new(0.0),
        Recorder::default(),
        NullSink,
    )
    .unwrap()
}

fn step_to(session: &mut Session<ManualClock, Recorder, NullSink>, t: f64) -> SessionPhase {
    session.clock().set(t);
    session.update()
}

#[test]
fn lead_in_notes_are_never_judged() {
    let mut s = recorded("#000:01:1111;\n#001:02:1000;");
    for t in [0.0, 0.5, 1.0, 1.5] {
        s.queue_input_edge(InputEdge::press(lane(1), t));
        s.queue_input_edge(InputEdge::release(lane(1), t + 0.01));
    }
    step_to(&mut s, 1.9);
    assert!(s.judgments().is_empty());
    assert_eq!(s.score().total_notes(), 1);
    assert!(s.scheduler().head_note(lane(1)).is_none());
}

#[test]
fn four_perfect_taps_clear_with_all_perfect() {
    let mut s = recorded("#001:01:1111;");
    for i in 0..4 {
        let t = 2.0 + 0.5 * f64::from(i);
        s.queue_input_edge(InputEdge::press(lane(1), t));
        s.queue_input_edge(InputEdge::release(lane(1), t + 0.02));
    }
    step_to(&mut s, 3.9);
    assert_eq!(s.judgments().len(), 4);
    assert!(s.judgments().iter().all(|j| j.grade == JudgeGrade::Perfect));
    assert_eq!(s.score().score(), 1_000_000);
    assert_eq!(s.score().ex_score(), 200_000);

    // Finishes once bar 2 starts with nothing left.
    assert_eq!(step_to(&mut s, 4.0), SessionPhase::Finished);
    let summary = s.finished_summary().unwrap();
    assert_eq!(summary.final_score, 1_200_000);
    assert_eq!(summary.rank, ClearRank::AllPerfect);
    assert_eq!(summary.max_combo, 4);
}

#[test]
fn input_far_from_the_head_is_ignored() {
    let mut s = recorded("#001:01:1000;");
    s.queue_input_edge(InputEdge::press(lane(1), 2.5));
    step_to(&mut s, 2.0);
    step_to(&mut s, 2.05);
    assert!(s.judgments().is_empty());

    // Early by half a second: outside every window.
    let mut s = recorded("#001:01:0010;");
    s.queue_input_edge(InputEdge::press(lane(1), 2.5));
    step_to(&mut s, 2.6);
    assert!(s.judgments().is_empty());
    assert_eq!(s.scheduler().head_note(lane(1)).map(|n| n.note.time), Some(3.0));
}

#[test]
fn hold_plays_through_with_automatic_ticks() {
    let mut s = recorded("#001:03:2334;");
    s.queue_input_edge(InputEdge::press(lane(3), 2.004));
    s.queue_input_edge(InputEdge::release(lane(3), 3.49));
    step_to(&mut s, 4.0);
    let grades: Vec<(JudgeGrade, JudgeSource)> =
        s.judgments().iter().map(|j| (j.grade, j.source)).collect();
    assert_eq!(
        grades,
        vec![
            (JudgeGrade::Perfect, JudgeSource::Press),
            (JudgeGrade::Perfect, JudgeSource::Hold),
            (JudgeGrade::Perfect, JudgeSource::Hold),
            (JudgeGrade::Perfect, JudgeSource::Release),
        ]
    );
    assert_eq!(s.phase(), SessionPhase::Finished);
}

#[test]
fn letting_go_of_a_hold_times_out_the_rest() {
    let mut s = recorded("#001:03:2334;");
    s.queue_input_edge(InputEdge::press(lane(3), 2.0));
    s.queue_input_edge(InputEdge::release(lane(3), 2.2));
    step_to(&mut s, 4.0);
    let misses = s.sink().missed.len();
    assert_eq!(misses, 3);
    assert!(s.sink().missed.iter().all(|(j, _)| j.grade == JudgeGrade::Uhm));
    assert_eq!(s.score().combo(), 0);
    assert_eq!(s.score().max_combo(), 1);
}

#[test]
fn timeline_handle_persists_across_bars() {
    let mut s = recorded("#001:01:1000;\n#002:01:1000;\n#003:11:1000;");
    step_to(&mut s, 2.0);
    let h = s.scheduler().group_timeline(LaneGroup::Upper).unwrap();
    step_to(&mut s, 4.0);
    assert_eq!(s.scheduler().group_timeline(LaneGroup::Upper), Some(h));
    step_to(&mut s, 6.0);
    assert_eq!(s.scheduler().group_timeline(LaneGroup::Upper), Some(h));
    assert_eq!(s.scheduler().running_timelines(), 1);
}

#[test]
fn next_bar_notes_turn_ghost_once_the_line_passes() {
    let mut s = recorded("#001:01:1000;\n#002:01:1111;");
    step_to(&mut s, 3.0);
    let states: Vec<(f32, NoteState)> = s
        .scheduler()
        .ghost_queue(lane(1))
        .map(|n| (n.x, n.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (-760.0, NoteState::Ghost),
            (-380.0, NoteState::Ghost),
            (0.0, NoteState::Hidden),
            (380.0, NoteState::Hidden),
        ]
    );
    step_to(&mut s, 4.0);
    assert!(s.scheduler().active_queue(lane(1)).all(|n| n.state == NoteState::Active));
    assert_eq!(s.scheduler().active_queue(lane(1)).count(), 4);
}

#[test]
fn preloaded_line_waits_then_runs() {
    let mut s = recorded("#001:04:0001;\n#002:02:1000;");
    let pre = s.scheduler().preloaded_timeline(LaneGroup::Lower).unwrap();
    step_to(&mut s, 1.0);
    let tl = s.scheduler().timeline(pre).unwrap();
    assert_eq!(tl.phase, TimelinePhase::Preloaded);
    assert_eq!(tl.x, -760.0);
    step_to(&mut s, 2.5);
    assert_eq!(s.scheduler().group_timeline(LaneGroup::Lower), Some(pre));
    assert_eq!(s.scheduler().timeline(pre).unwrap().phase, TimelinePhase::Running);
}

#[test]
fn abandoned_line_is_released_and_reported() {
    let chart = parse_chart("#001:01:1000;\n#002:03:1000;\n#003:03:1000;", BPM).chart;
    let mut screen = Screen::default();
    let clock = ManualClock::new(0.0);
    let mut s = Session::new(&chart, SessionConfig::default(), &clock, NullSink, &mut screen).unwrap();
    clock.set(2.0);
    s.update();
    let upper = s.scheduler().group_timeline(LaneGroup::Upper).unwrap();
    clock.set(4.0);
    s.update();
    assert_eq!(s.scheduler().timeline(upper).unwrap().phase, TimelinePhase::Retired);
    clock.set(5.0);
    s.update();
    assert!(s.scheduler().timeline(upper).is_none());
    drop(s);
    assert_eq!(screen.lines_removed, vec![upper]);
    assert!(!screen.lines_moved.is_empty());
}

#[test]
fn queues_stay_time_ordered() {
    let mut s = recorded("#001:02:10000001;\n#002:02:1100;");
    step_to(&mut s, 2.0);
    let times: Vec<f64> = s.scheduler().active_queue(lane(2)).map(|n| n.note.time).collect();
    assert_eq!(times, vec![2.0, 3.75]);
    step_to(&mut s, 4.0);
    let times: Vec<f64> = s.scheduler().active_queue(lane(2)).map(|n| n.note.time).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn every_note_is_resolved_exactly_once() {
    let mut s = recorded("#001:01:1010;\n#001:02:0101;\n#002:03:2344;\n#002:04:1111;");
    // Hit a few, let the rest time out.
    s.queue_input_edge(InputEdge::press(lane(1), 2.0));
    s.queue_input_edge(InputEdge::release(lane(1), 2.05));
    s.queue_input_edge(InputEdge::press(lane(2), 2.52));
    s.queue_input_edge(InputEdge::release(lane(2), 2.6));
    s.queue_input_edge(InputEdge::press(lane(4), 4.5));
    s.queue_input_edge(InputEdge::press(lane(4), 4.5));
    let mut t = 0.0;
    while step_to(&mut s, t) == SessionPhase::Playing {
        t += 1.0 / 60.0;
        assert!(t < 20.0);
    }
    let summary = s.finished_summary().unwrap();
    assert_eq!(summary.total_notes, 12);
    assert!(summary.is_complete());
    assert_eq!(s.judgments().len(), 12);
    let mut seen: Vec<(u8, u64)> = s
        .judgments()
        .iter()
        .map(|j| (j.lane.number(), j.note_time.to_bits()))
        .collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 12);
}

#[test]
fn gauge_is_full_only_for_full_credit() {
    let mut s = recorded("#001:01:1111;");
    s.queue_input_edge(InputEdge::press(lane(1), 2.0));
    s.queue_input_edge(InputEdge::release(lane(1), 2.02));
    s.queue_input_edge(InputEdge::press(lane(1), 2.53));
    s.queue_input_edge(InputEdge::release(lane(1), 2.6));
    s.queue_input_edge(InputEdge::press(lane(1), 3.07));
    step_to(&mut s, 3.2);
    let events: Vec<ScoreEvent> = s.sink().judged.iter().map(|(_, e)| *e).collect();
    assert_eq!(events.len(), 3);
    // Perfect, Master: full credit. Ideal: 0.7.
    assert_eq!(events[0].gauge, 100.0);
    assert_eq!(events[1].gauge, 100.0);
    assert!(events[2].gauge < 100.0);
    assert_eq!(events[2].combo, 3);
}

#[test]
fn finished_fires_once() {
    let mut s = recorded("#001:01:1000;");
    step_to(&mut s, 3.0);
    assert_eq!(step_to(&mut s, 4.0), SessionPhase::Finished);
    assert_eq!(step_to(&mut s, 5.0), SessionPhase::Finished);
    step_to(&mut s, 6.0);
    assert_eq!(s.sink().finished.len(), 1);
    let summary = &s.sink().finished[0];
    assert_eq!(summary.misses, 1);
    assert_eq!(summary.rank, ClearRank::Fail);
}

#[test]
fn input_arrives_through_the_channel() {
    let mut s = recorded("#001:02:1000;");
    let (tx, rx) = input_channel();
    s.attach_input(rx);
    assert!(tx.lane_pressed(2, 2.01));
    // Unknown lanes are dropped on the sending side.
    tx.lane_pressed(9, 2.02);
    step_to(&mut s, 2.1);
    assert_eq!(s.judgments().len(), 1);
    assert_eq!(s.judgments()[0].grade, JudgeGrade::Perfect);
    assert!(s.lanes().is_held(lane(2)));
}

#[test]
fn presenter_sees_moves_and_removals() {
    let chart = parse_chart("#001:01:1100;", BPM).chart;
    let mut screen = Screen::default();
    let clock = ManualClock::new(0.0);
    let mut s = Session::new(&chart, SessionConfig::default(), &clock, NullSink, &mut screen).unwrap();
    clock.set(1.0);
    s.update();
    s.queue_input_edge(InputEdge::press(lane(1), 2.0));
    clock.set(2.1);
    s.update();
    clock.set(2.2);
    s.update();
    drop(s);
    assert!(!screen.notes_moved.is_empty());
    assert_eq!(screen.notes_removed.len(), 1);
    let removed = screen.notes_removed[0];
    let last_seen = screen.notes_moved.iter().rev().find(|(h, _)| *h == removed);
    assert!(last_seen.is_some());
}
