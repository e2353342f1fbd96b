use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Program logic: indexed and recursed into.
    Structural,
    /// Literal or menu holder, inlined as a value.
    Shadow,
    OutOfScope,
}

/// Shadow a literal input gets when it is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowType {
    Number,
    PositiveNumber,
    WholeNumber,
    Integer,
    Angle,
    Text,
    Color,
}

impl ShadowType {
    pub fn opcode(self) -> &'static str {
        match self {
            ShadowType::Number => "math_number",
            ShadowType::PositiveNumber => "math_positive_number",
            ShadowType::WholeNumber => "math_whole_number",
            ShadowType::Integer => "math_integer",
            ShadowType::Angle => "math_angle",
            ShadowType::Text => "text",
            ShadowType::Color => "colour_picker",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            ShadowType::Text => "TEXT",
            ShadowType::Color => "COLOUR",
            _ => "NUM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Literal(ShadowType, &'static str),
    Boolean,
    /// Menu shadow: opcode, option field, default option.
    Menu(&'static str, &'static str, &'static str),
    /// Procedure prototype holder of a definition hat.
    Prototype,
}

#[derive(Debug, Clone, Copy)]
pub struct InputSpec {
    pub name: &'static str,
    pub kind: InputKind,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockSpec {
    pub opcode: &'static str,
    pub inputs: &'static [InputSpec],
    pub branches: usize,
    /// Fields the block carries itself, with their template value.
    pub fields: &'static [(&'static str, &'static str)],
}

const fn lit(name: &'static str, kind: ShadowType, default: &'static str) -> InputSpec {
    InputSpec {
        name,
        kind: InputKind::Literal(kind, default),
    }
}

const fn num(name: &'static str, default: &'static str) -> InputSpec {
    lit(name, ShadowType::Number, default)
}

const fn text(name: &'static str, default: &'static str) -> InputSpec {
    lit(name, ShadowType::Text, default)
}

const fn cond(name: &'static str) -> InputSpec {
    InputSpec {
        name,
        kind: InputKind::Boolean,
    }
}

const fn menu(
    name: &'static str,
    opcode: &'static str,
    field: &'static str,
    default: &'static str,
) -> InputSpec {
    InputSpec {
        name,
        kind: InputKind::Menu(opcode, field, default),
    }
}

const fn spec(
    opcode: &'static str,
    inputs: &'static [InputSpec],
    branches: usize,
    fields: &'static [(&'static str, &'static str)],
) -> BlockSpec {
    BlockSpec {
        opcode,
        inputs,
        branches,
        fields,
    }
}

const MOTION: &[BlockSpec] = &[
    spec("motion_movesteps", &[num("STEPS", "10")], 0, &[]),
    spec("motion_turnright", &[num("DEGREES", "15")], 0, &[]),
    spec("motion_turnleft", &[num("DEGREES", "15")], 0, &[]),
    spec("motion_goto", &[menu("TO", "motion_goto_menu", "TO", "_random_")], 0, &[]),
    spec("motion_gotoxy", &[num("X", "0"), num("Y", "0")], 0, &[]),
    spec(
        "motion_glideto",
        &[num("SECS", "1"), menu("TO", "motion_glideto_menu", "TO", "_random_")],
        0,
        &[],
    ),
    spec(
        "motion_glidesecstoxy",
        &[num("SECS", "1"), num("X", "0"), num("Y", "0")],
        0,
        &[],
    ),
    spec(
        "motion_pointindirection",
        &[lit("DIRECTION", ShadowType::Angle, "90")],
        0,
        &[],
    ),
    spec(
        "motion_pointtowards",
        &[menu("TOWARDS", "motion_pointtowards_menu", "TOWARDS", "_mouse_")],
        0,
        &[],
    ),
    spec("motion_changexby", &[num("DX", "10")], 0, &[]),
    spec("motion_setx", &[num("X", "0")], 0, &[]),
    spec("motion_changeyby", &[num("DY", "10")], 0, &[]),
    spec("motion_sety", &[num("Y", "0")], 0, &[]),
    spec("motion_ifonedgebounce", &[], 0, &[]),
    spec("motion_setrotationstyle", &[], 0, &[("STYLE", "left-right")]),
    spec("motion_xposition", &[], 0, &[]),
    spec("motion_yposition", &[], 0, &[]),
    spec("motion_direction", &[], 0, &[]),
];

const LOOKS: &[BlockSpec] = &[
    spec(
        "looks_sayforsecs",
        &[text("MESSAGE", "Hello!"), num("SECS", "2")],
        0,
        &[],
    ),
    spec("looks_say", &[text("MESSAGE", "Hello!")], 0, &[]),
    spec(
        "looks_thinkforsecs",
        &[text("MESSAGE", "Hmm..."), num("SECS", "2")],
        0,
        &[],
    ),
    spec("looks_think", &[text("MESSAGE", "Hmm...")], 0, &[]),
    spec(
        "looks_switchcostumeto",
        &[menu("COSTUME", "looks_costume", "COSTUME", "")],
        0,
        &[],
    ),
    spec("looks_nextcostume", &[], 0, &[]),
    spec(
        "looks_switchbackdropto",
        &[menu("BACKDROP", "looks_backdrops", "BACKDROP", "")],
        0,
        &[],
    ),
    spec(
        "looks_switchbackdroptoandwait",
        &[menu("BACKDROP", "looks_backdrops", "BACKDROP", "")],
        0,
        &[],
    ),
    spec("looks_nextbackdrop", &[], 0, &[]),
    spec("looks_changesizeby", &[num("CHANGE", "10")], 0, &[]),
    spec("looks_setsizeto", &[num("SIZE", "100")], 0, &[]),
    spec("looks_changeeffectby", &[num("CHANGE", "25")], 0, &[("EFFECT", "COLOR")]),
    spec("looks_seteffectto", &[num("VALUE", "0")], 0, &[("EFFECT", "COLOR")]),
    spec("looks_cleargraphiceffects", &[], 0, &[]),
    spec("looks_show", &[], 0, &[]),
    spec("looks_hide", &[], 0, &[]),
    spec("looks_gotofrontback", &[], 0, &[("FRONT_BACK", "front")]),
    spec(
        "looks_goforwardbackwardlayers",
        &[lit("NUM", ShadowType::Integer, "1")],
        0,
        &[("FORWARD_BACKWARD", "forward")],
    ),
    spec("looks_costumenumbername", &[], 0, &[("NUMBER_NAME", "number")]),
    spec("looks_backdropnumbername", &[], 0, &[("NUMBER_NAME", "number")]),
    spec("looks_size", &[], 0, &[]),
];

const SOUND: &[BlockSpec] = &[
    spec(
        "sound_playuntildone",
        &[menu("SOUND_MENU", "sound_sounds_menu", "SOUND_MENU", "")],
        0,
        &[],
    ),
    spec(
        "sound_play",
        &[menu("SOUND_MENU", "sound_sounds_menu", "SOUND_MENU", "")],
        0,
        &[],
    ),
    spec("sound_stopallsounds", &[], 0, &[]),
    spec("sound_changeeffectby", &[num("VALUE", "10")], 0, &[("EFFECT", "PITCH")]),
    spec("sound_seteffectto", &[num("VALUE", "100")], 0, &[("EFFECT", "PITCH")]),
    spec("sound_cleareffects", &[], 0, &[]),
    spec("sound_changevolumeby", &[num("VOLUME", "-10")], 0, &[]),
    spec("sound_setvolumeto", &[num("VOLUME", "100")], 0, &[]),
    spec("sound_volume", &[], 0, &[]),
];

const EVENTS: &[BlockSpec] = &[
    spec("event_whenflagclicked", &[], 0, &[]),
    spec("event_whenkeypressed", &[], 0, &[("KEY_OPTION", "space")]),
    spec("event_whenthisspriteclicked", &[], 0, &[]),
    spec("event_whenstageclicked", &[], 0, &[]),
    spec("event_whenbackdropswitchesto", &[], 0, &[("BACKDROP", "")]),
    spec(
        "event_whengreaterthan",
        &[num("VALUE", "10")],
        0,
        &[("WHENGREATERTHANMENU", "LOUDNESS")],
    ),
    spec("event_whenbroadcastreceived", &[], 0, &[("BROADCAST_OPTION", "message1")]),
    spec(
        "event_broadcast",
        &[menu("BROADCAST_INPUT", "event_broadcast_menu", "BROADCAST_OPTION", "message1")],
        0,
        &[],
    ),
    spec(
        "event_broadcastandwait",
        &[menu("BROADCAST_INPUT", "event_broadcast_menu", "BROADCAST_OPTION", "message1")],
        0,
        &[],
    ),
];

const CONTROL: &[BlockSpec] = &[
    spec(
        "control_wait",
        &[lit("DURATION", ShadowType::PositiveNumber, "1")],
        0,
        &[],
    ),
    spec(
        "control_repeat",
        &[lit("TIMES", ShadowType::WholeNumber, "10")],
        1,
        &[],
    ),
    spec("control_forever", &[], 1, &[]),
    spec("control_if", &[cond("CONDITION")], 1, &[]),
    spec("control_if_else", &[cond("CONDITION")], 2, &[]),
    spec("control_wait_until", &[cond("CONDITION")], 0, &[]),
    spec("control_repeat_until", &[cond("CONDITION")], 1, &[]),
    spec("control_while", &[cond("CONDITION")], 1, &[]),
    spec("control_stop", &[], 0, &[("STOP_OPTION", "all")]),
    spec("control_start_as_clone", &[], 0, &[]),
    spec(
        "control_create_clone_of",
        &[menu("CLONE_OPTION", "control_create_clone_of_menu", "CLONE_OPTION", "_myself_")],
        0,
        &[],
    ),
    spec("control_delete_this_clone", &[], 0, &[]),
];

const SENSING: &[BlockSpec] = &[
    spec(
        "sensing_touchingobject",
        &[menu(
            "TOUCHINGOBJECTMENU",
            "sensing_touchingobjectmenu",
            "TOUCHINGOBJECTMENU",
            "_mouse_",
        )],
        0,
        &[],
    ),
    spec(
        "sensing_touchingcolor",
        &[lit("COLOR", ShadowType::Color, "#ff0000")],
        0,
        &[],
    ),
    spec(
        "sensing_coloristouchingcolor",
        &[
            lit("COLOR", ShadowType::Color, "#ff0000"),
            lit("COLOR2", ShadowType::Color, "#00ff00"),
        ],
        0,
        &[],
    ),
    spec(
        "sensing_distanceto",
        &[menu("DISTANCETOMENU", "sensing_distancetomenu", "DISTANCETOMENU", "_mouse_")],
        0,
        &[],
    ),
    spec(
        "sensing_askandwait",
        &[text("QUESTION", "What's your name?")],
        0,
        &[],
    ),
    spec("sensing_answer", &[], 0, &[]),
    spec(
        "sensing_keypressed",
        &[menu("KEY_OPTION", "sensing_keyoptions", "KEY_OPTION", "space")],
        0,
        &[],
    ),
    spec("sensing_mousedown", &[], 0, &[]),
    spec("sensing_mousex", &[], 0, &[]),
    spec("sensing_mousey", &[], 0, &[]),
    spec("sensing_setdragmode", &[], 0, &[("DRAG_MODE", "draggable")]),
    spec("sensing_loudness", &[], 0, &[]),
    spec("sensing_timer", &[], 0, &[]),
    spec("sensing_resettimer", &[], 0, &[]),
    spec(
        "sensing_of",
        &[menu("OBJECT", "sensing_of_object_menu", "OBJECT", "_stage_")],
        0,
        &[("PROPERTY", "backdrop #")],
    ),
    spec("sensing_current", &[], 0, &[("CURRENTMENU", "YEAR")]),
    spec("sensing_dayssince2000", &[], 0, &[]),
    spec("sensing_username", &[], 0, &[]),
];

const OPERATORS: &[BlockSpec] = &[
    spec("operator_add", &[num("NUM1", ""), num("NUM2", "")], 0, &[]),
    spec("operator_subtract", &[num("NUM1", ""), num("NUM2", "")], 0, &[]),
    spec("operator_multiply", &[num("NUM1", ""), num("NUM2", "")], 0, &[]),
    spec("operator_divide", &[num("NUM1", ""), num("NUM2", "")], 0, &[]),
    spec("operator_random", &[num("FROM", "1"), num("TO", "10")], 0, &[]),
    spec(
        "operator_gt",
        &[text("OPERAND1", ""), text("OPERAND2", "50")],
        0,
        &[],
    ),
    spec(
        "operator_lt",
        &[text("OPERAND1", ""), text("OPERAND2", "50")],
        0,
        &[],
    ),
    spec(
        "operator_equals",
        &[text("OPERAND1", ""), text("OPERAND2", "50")],
        0,
        &[],
    ),
    spec("operator_and", &[cond("OPERAND1"), cond("OPERAND2")], 0, &[]),
    spec("operator_or", &[cond("OPERAND1"), cond("OPERAND2")], 0, &[]),
    spec("operator_not", &[cond("OPERAND")], 0, &[]),
    spec(
        "operator_join",
        &[text("STRING1", "apple "), text("STRING2", "banana")],
        0,
        &[],
    ),
    spec(
        "operator_letter_of",
        &[lit("LETTER", ShadowType::WholeNumber, "1"), text("STRING", "apple")],
        0,
        &[],
    ),
    spec("operator_length", &[text("STRING", "apple")], 0, &[]),
    spec(
        "operator_contains",
        &[text("STRING1", "apple"), text("STRING2", "a")],
        0,
        &[],
    ),
    spec("operator_mod", &[num("NUM1", ""), num("NUM2", "")], 0, &[]),
    spec("operator_round", &[num("NUM", "")], 0, &[]),
    spec("operator_mathop", &[num("NUM", "")], 0, &[("OPERATOR", "abs")]),
];

const DATA: &[BlockSpec] = &[
    spec("data_variable", &[], 0, &[("VARIABLE", "")]),
    spec("data_setvariableto", &[text("VALUE", "0")], 0, &[("VARIABLE", "")]),
    spec("data_changevariableby", &[num("VALUE", "1")], 0, &[("VARIABLE", "")]),
    spec("data_showvariable", &[], 0, &[("VARIABLE", "")]),
    spec("data_hidevariable", &[], 0, &[("VARIABLE", "")]),
    spec("data_listcontents", &[], 0, &[("LIST", "")]),
    spec("data_addtolist", &[text("ITEM", "thing")], 0, &[("LIST", "")]),
    spec(
        "data_deleteoflist",
        &[lit("INDEX", ShadowType::Integer, "1")],
        0,
        &[("LIST", "")],
    ),
    spec("data_deletealloflist", &[], 0, &[("LIST", "")]),
    spec(
        "data_insertatlist",
        &[text("ITEM", "thing"), lit("INDEX", ShadowType::Integer, "1")],
        0,
        &[("LIST", "")],
    ),
    spec(
        "data_replaceitemoflist",
        &[lit("INDEX", ShadowType::Integer, "1"), text("ITEM", "thing")],
        0,
        &[("LIST", "")],
    ),
    spec(
        "data_itemoflist",
        &[lit("INDEX", ShadowType::Integer, "1")],
        0,
        &[("LIST", "")],
    ),
    spec("data_itemnumoflist", &[text("ITEM", "thing")], 0, &[("LIST", "")]),
    spec("data_lengthoflist", &[], 0, &[("LIST", "")]),
    spec("data_listcontainsitem", &[text("ITEM", "thing")], 0, &[("LIST", "")]),
    spec("data_showlist", &[], 0, &[("LIST", "")]),
    spec("data_hidelist", &[], 0, &[("LIST", "")]),
];

const PROCEDURES: &[BlockSpec] = &[
    spec(
        "procedures_definition",
        &[InputSpec {
            name: "custom_block",
            kind: InputKind::Prototype,
        }],
        0,
        &[],
    ),
    spec("procedures_call", &[], 0, &[]),
    spec("argument_reporter_string_number", &[], 0, &[("VALUE", "")]),
    spec("argument_reporter_boolean", &[], 0, &[("VALUE", "")]),
];

const PEN: &[BlockSpec] = &[
    spec("pen_clear", &[], 0, &[]),
    spec("pen_stamp", &[], 0, &[]),
    spec("pen_penDown", &[], 0, &[]),
    spec("pen_penUp", &[], 0, &[]),
    spec(
        "pen_setPenColorToColor",
        &[lit("COLOR", ShadowType::Color, "#0000ff")],
        0,
        &[],
    ),
    spec(
        "pen_changePenColorParamBy",
        &[
            menu("COLOR_PARAM", "pen_menu_colorParam", "colorParam", "color"),
            num("VALUE", "10"),
        ],
        0,
        &[],
    ),
    spec(
        "pen_setPenColorParamTo",
        &[
            menu("COLOR_PARAM", "pen_menu_colorParam", "colorParam", "color"),
            num("VALUE", "50"),
        ],
        0,
        &[],
    ),
    spec("pen_changePenSizeBy", &[num("SIZE", "1")], 0, &[]),
    spec("pen_setPenSizeTo", &[num("SIZE", "1")], 0, &[]),
];

const ALL: &[&[BlockSpec]] = &[
    MOTION, LOOKS, SOUND, EVENTS, CONTROL, SENSING, OPERATORS, DATA, PROCEDURES, PEN,
];

/// Shadow opcodes with their primary field. `procedures_prototype` carries no value.
const SHADOWS: &[(&str, Option<&str>)] = &[
    ("math_number", Some("NUM")),
    ("math_positive_number", Some("NUM")),
    ("math_whole_number", Some("NUM")),
    ("math_integer", Some("NUM")),
    ("math_angle", Some("NUM")),
    ("text", Some("TEXT")),
    ("colour_picker", Some("COLOUR")),
    ("motion_goto_menu", Some("TO")),
    ("motion_glideto_menu", Some("TO")),
    ("motion_pointtowards_menu", Some("TOWARDS")),
    ("looks_costume", Some("COSTUME")),
    ("looks_backdrops", Some("BACKDROP")),
    ("sound_sounds_menu", Some("SOUND_MENU")),
    ("event_broadcast_menu", Some("BROADCAST_OPTION")),
    ("control_create_clone_of_menu", Some("CLONE_OPTION")),
    ("sensing_touchingobjectmenu", Some("TOUCHINGOBJECTMENU")),
    ("sensing_distancetomenu", Some("DISTANCETOMENU")),
    ("sensing_keyoptions", Some("KEY_OPTION")),
    ("sensing_of_object_menu", Some("OBJECT")),
    ("pen_menu_colorParam", Some("colorParam")),
    ("procedures_prototype", None),
];

fn specs() -> &'static HashMap<&'static str, &'static BlockSpec> {
    static SPECS: OnceLock<HashMap<&'static str, &'static BlockSpec>> = OnceLock::new();
    SPECS.get_or_init(|| {
        ALL.iter()
            .flat_map(|group| group.iter())
            .map(|spec| (spec.opcode, spec))
            .collect()
    })
}

pub fn classify(opcode: &str) -> BlockKind {
    if specs().contains_key(opcode) {
        BlockKind::Structural
    } else if SHADOWS.iter().any(|(op, _)| *op == opcode) {
        BlockKind::Shadow
    } else {
        BlockKind::OutOfScope
    }
}

pub fn block_spec(opcode: &str) -> Option<&'static BlockSpec> {
    specs().get(opcode).copied()
}

/// Input slots shown for `opcode` even when nothing is plugged in.
pub fn expected_inputs(opcode: &str) -> Vec<&'static str> {
    block_spec(opcode)
        .map(|spec| spec.inputs.iter().map(|input| input.name).collect())
        .unwrap_or_default()
}

/// Branch slots shown for `opcode` even when empty.
pub fn expected_branches(opcode: &str) -> &'static [&'static str] {
    let count = block_spec(opcode).map(|spec| spec.branches).unwrap_or(0);
    &crate::model::BRANCH_NAMES[..count.min(2)]
}

pub fn input_kind(opcode: &str, input: &str) -> Option<InputKind> {
    block_spec(opcode)?
        .inputs
        .iter()
        .find(|spec| spec.name == input)
        .map(|spec| spec.kind)
}

/// Boolean slots only accept reporter blocks, never a literal shadow.
pub fn is_boolean_input(opcode: &str, input: &str) -> bool {
    matches!(input_kind(opcode, input), Some(InputKind::Boolean))
}

pub fn shadow_primary_field(opcode: &str) -> Option<&'static str> {
    SHADOWS
        .iter()
        .find(|(op, _)| *op == opcode)
        .and_then(|(_, field)| *field)
}

pub fn shadow_type_for_opcode(opcode: &str) -> Option<ShadowType> {
    [
        ShadowType::Number,
        ShadowType::PositiveNumber,
        ShadowType::WholeNumber,
        ShadowType::Integer,
        ShadowType::Angle,
        ShadowType::Text,
        ShadowType::Color,
    ]
    .into_iter()
    .find(|t| t.opcode() == opcode)
}

const SHADOW_NAME_TABLE: &[(&str, ShadowType)] = &[
    ("COLOR", ShadowType::Color),
    ("COLOR2", ShadowType::Color),
    ("COLOUR", ShadowType::Color),
    ("DIRECTION", ShadowType::Angle),
    ("DEGREES", ShadowType::Angle),
    ("ANGLE", ShadowType::Angle),
    ("MESSAGE", ShadowType::Text),
    ("TEXT", ShadowType::Text),
    ("STRING", ShadowType::Text),
    ("STRING1", ShadowType::Text),
    ("STRING2", ShadowType::Text),
    ("QUESTION", ShadowType::Text),
    ("ITEM", ShadowType::Text),
];

/// Picks the shadow to synthesize for an empty input from its name alone.
pub fn infer_shadow_type(input_name: &str, field_name: Option<&str>) -> ShadowType {
    let names = field_name
        .into_iter()
        .chain(std::iter::once(input_name))
        .map(|n| n.to_ascii_uppercase())
        .collect::<Vec<_>>();
    for name in &names {
        if let Some((_, kind)) = SHADOW_NAME_TABLE.iter().find(|(key, _)| *key == name.as_str()) {
            return *kind;
        }
    }
    for name in &names {
        if name.contains("COLOR") || name.contains("COLOUR") {
            return ShadowType::Color;
        }
        if name.contains("ANGLE") || name.contains("DIRECTION") {
            return ShadowType::Angle;
        }
        if name.contains("TEXT") || name.contains("MESSAGE") || name.contains("STRING") {
            return ShadowType::Text;
        }
    }
    ShadowType::Number
}

/// Fields whose value names a project entity (stored with its id).
pub fn is_reference_field(field: &str) -> bool {
    matches!(field, "VARIABLE" | "LIST" | "BROADCAST_OPTION")
}

/// Fields whose value is a broadcast message resolved or created by name.
pub fn is_message_field(opcode: &str, field: &str) -> bool {
    field == "BROADCAST_OPTION"
        && matches!(opcode, "event_broadcast_menu" | "event_whenbroadcastreceived")
}

const KEY_NAMES: &[&str] = &[
    "space", "up arrow", "down arrow", "right arrow", "left arrow", "any", "a", "b", "c", "d",
    "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v",
    "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

const TIME_UNITS: &[(&str, &str)] = &[
    ("year", "YEAR"),
    ("month", "MONTH"),
    ("date", "DATE"),
    ("day of week", "DAYOFWEEK"),
    ("hour", "HOUR"),
    ("minute", "MINUTE"),
    ("second", "SECOND"),
];

const STOP_OPTIONS: &[(&str, &str)] = &[
    ("all", "all"),
    ("this script", "this script"),
    ("other scripts in sprite", "other scripts in sprite"),
];

const LOOKS_EFFECTS: &[(&str, &str)] = &[
    ("color", "COLOR"),
    ("fisheye", "FISHEYE"),
    ("whirl", "WHIRL"),
    ("pixelate", "PIXELATE"),
    ("mosaic", "MOSAIC"),
    ("brightness", "BRIGHTNESS"),
    ("ghost", "GHOST"),
];

const SOUND_EFFECTS: &[(&str, &str)] = &[("pitch", "PITCH"), ("pan left/right", "PAN")];

const ROTATION_STYLES: &[(&str, &str)] = &[
    ("left-right", "left-right"),
    ("don't rotate", "don't rotate"),
    ("all around", "all around"),
];

const FRONT_BACK: &[(&str, &str)] = &[("front", "front"), ("back", "back")];
const FORWARD_BACKWARD: &[(&str, &str)] = &[("forward", "forward"), ("backward", "backward")];
const NUMBER_NAME: &[(&str, &str)] = &[("number", "number"), ("name", "name")];
const DRAG_MODES: &[(&str, &str)] = &[
    ("draggable", "draggable"),
    ("not draggable", "not draggable"),
];
const GREATER_THAN: &[(&str, &str)] = &[("loudness", "LOUDNESS"), ("timer", "TIMER")];
const PEN_PARAMS: &[(&str, &str)] = &[
    ("color", "color"),
    ("saturation", "saturation"),
    ("brightness", "brightness"),
    ("transparency", "transparency"),
];
const MATH_OPS: &[(&str, &str)] = &[
    ("abs", "abs"),
    ("floor", "floor"),
    ("ceiling", "ceiling"),
    ("sqrt", "sqrt"),
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("asin", "asin"),
    ("acos", "acos"),
    ("atan", "atan"),
    ("ln", "ln"),
    ("log", "log"),
    ("e ^", "e ^"),
    ("10 ^", "10 ^"),
];

/// Fixed (label, code) enumerations that do not depend on project state.
pub fn fixed_menu(opcode: &str, field: &str) -> Option<Vec<(&'static str, &'static str)>> {
    let table: &[(&'static str, &'static str)] = match (opcode, field) {
        (_, "KEY_OPTION") => return Some(KEY_NAMES.iter().map(|k| (*k, *k)).collect()),
        ("sensing_current", "CURRENTMENU") => TIME_UNITS,
        ("control_stop", "STOP_OPTION") => STOP_OPTIONS,
        ("looks_changeeffectby" | "looks_seteffectto", "EFFECT") => LOOKS_EFFECTS,
        ("sound_changeeffectby" | "sound_seteffectto", "EFFECT") => SOUND_EFFECTS,
        ("motion_setrotationstyle", "STYLE") => ROTATION_STYLES,
        ("looks_gotofrontback", "FRONT_BACK") => FRONT_BACK,
        ("looks_goforwardbackwardlayers", "FORWARD_BACKWARD") => FORWARD_BACKWARD,
        (_, "NUMBER_NAME") => NUMBER_NAME,
        ("sensing_setdragmode", "DRAG_MODE") => DRAG_MODES,
        ("event_whengreaterthan", "WHENGREATERTHANMENU") => GREATER_THAN,
        ("pen_menu_colorParam", "colorParam") => PEN_PARAMS,
        ("operator_mathop", "OPERATOR") => MATH_OPS,
        _ => return None,
    };
    Some(table.to_vec())
}

/// Special (label, code) entries of sprite-target menus, ahead of sprite names.
pub fn special_targets(field: &str) -> &'static [(&'static str, &'static str)] {
    match field {
        "TO" => &[("random position", "_random_"), ("mouse-pointer", "_mouse_")],
        "TOWARDS" | "DISTANCETOMENU" => &[("mouse-pointer", "_mouse_")],
        "TOUCHINGOBJECTMENU" => &[("mouse-pointer", "_mouse_"), ("edge", "_edge_")],
        "CLONE_OPTION" => &[("myself", "_myself_")],
        "OBJECT" => &[("Stage", "_stage_")],
        _ => &[],
    }
}

pub fn is_sprite_menu_field(field: &str) -> bool {
    matches!(
        field,
        "TO" | "TOWARDS" | "DISTANCETOMENU" | "TOUCHINGOBJECTMENU" | "CLONE_OPTION" | "OBJECT"
    )
}

/// Hat blocks start a script and never sit below another block.
pub fn is_hat(opcode: &str) -> bool {
    opcode.starts_with("event_when")
        || matches!(opcode, "control_start_as_clone" | "procedures_definition")
}

pub const STAGE_PROPERTIES: &[&str] = &["backdrop #", "backdrop name", "volume"];
pub const SPRITE_PROPERTIES: &[&str] = &[
    "x position",
    "y position",
    "direction",
    "costume #",
    "costume name",
    "size",
    "volume",
];
